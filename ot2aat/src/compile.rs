//! Compiling rules into AAT state tables

pub use anchors::{
    assign_anchors, resolve_groups, AnchorAssignment, AnchorRole, AssignmentResult,
    AttachmentKind, GroupId, GroupName, SemanticGroup,
};
pub use compiler::{compile_parsed, Compiler};
pub use error::CompilerError;
pub use features::aat_feature;
pub use kerx::{
    ControlPointSubtable, DistanceList, KernPair, KerxState, KerxTables, KerxTransition,
    PointAction, START_STATE,
};
pub use lookups::{
    ContextualSubtable, Entry, EntryFlags, InsertAction, Insertion, InsertionSubtable,
    LigatureSubtable, MatchClass, NoncontextualSubtable, RearrangementSubtable, StateTable,
    SubstTable, SubtableBody, Substitution, Verb, CONTROL_COLUMNS, START_STATES,
};
pub use opts::{Opts, MAX_INSERTION_GLYPHS, MAX_PATTERN_LEN};
pub use output::{Compilation, MorxSubtable};
pub use partition::{Partition, PartitionRole, Partitioning};

mod anchors;
mod compiler;
mod error;
mod features;
mod kerx;
mod lookups;
mod machine;
mod opts;
mod output;
mod partition;
mod session;
