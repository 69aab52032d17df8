use std::{path::PathBuf, str::FromStr};

#[derive(Clone, Debug, clap::Parser)]
#[command(version, about)]
pub struct Args {
    /// Path to the rule file to compile
    pub input: PathBuf,
    #[arg(short, long)]
    /// Optional destination path for writing output. Default is stdout.
    pub out: Option<PathBuf>,
    /// Tables to compile, one of morx/kerx/all (case insensitive)
    #[arg(short, long, default_value_t)]
    pub table: Table,
    /// Only compile lookups for these scripts. Comma separated, may be repeated.
    #[arg(short, long = "script", value_delimiter = ',')]
    pub scripts: Vec<String>,
    /// The most diagnostics to print
    #[arg(long, default_value_t = 100)]
    pub max_errors: usize,
    /// Also write the parsed rules, as YAML, to this path
    #[arg(long)]
    pub emit_ir: Option<PathBuf>,
}

/// What tables to compile
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Table {
    #[default]
    All,
    Morx,
    Kerx,
}

impl Table {
    pub fn includes_morx(self) -> bool {
        matches!(self, Table::All | Table::Morx)
    }

    pub fn includes_kerx(self) -> bool {
        matches!(self, Table::All | Table::Kerx)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Table::All => f.write_str("all"),
            Table::Morx => f.write_str("morx"),
            Table::Kerx => f.write_str("kerx"),
        }
    }
}

impl FromStr for Table {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static ERR_MSG: &str = "expected one of 'morx', 'kerx', 'all'";
        match s.to_ascii_lowercase().trim() {
            "morx" => Ok(Self::Morx),
            "kerx" => Ok(Self::Kerx),
            "all" => Ok(Self::All),
            _ => Err(ERR_MSG),
        }
    }
}
