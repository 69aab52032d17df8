//! State shared by every lookup in one compilation.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    common::{GlyphClass, GlyphId, GlyphInterner},
    parse::ParsedSource,
    types::{ClassName, GlyphOrClass, Lookup, LookupRules},
};

use super::Opts;

/// The classes visible to the compiler: the declared ones, plus a synthetic
/// class for every literal glyph or inline class used in a rule pattern.
///
/// Synthetic classes are registered up front, before any lookup is built, so
/// that their names do not depend on the order lookups are compiled in.
pub(crate) struct Session<'a> {
    pub(crate) source: &'a ParsedSource,
    pub(crate) opts: &'a Opts,
    synthetic: IndexMap<ClassName, GlyphClass>,
    by_content: HashMap<GlyphClass, ClassName>,
    next_id: usize,
}

impl<'a> Session<'a> {
    pub(crate) fn new(source: &'a ParsedSource, opts: &'a Opts) -> Self {
        Session {
            source,
            opts,
            synthetic: IndexMap::new(),
            by_content: HashMap::new(),
            next_id: 1,
        }
    }

    pub(crate) fn glyphs(&self) -> &GlyphInterner {
        &self.source.glyphs
    }

    /// Register the synthetic classes used by every pattern in this lookup.
    pub(crate) fn register_lookup(&mut self, lookup: &Lookup) {
        match &lookup.rules {
            LookupRules::Contextual(rules) => {
                for rule in rules {
                    let (pattern, _) = rule.item.pattern();
                    for element in pattern {
                        self.register(element);
                    }
                }
            }
            LookupRules::Reorder(rules) => {
                for rule in rules {
                    for element in &rule.item.before {
                        self.register(element);
                    }
                }
            }
            LookupRules::Simple(_) | LookupRules::Ligature(_) | LookupRules::OneToMany(_) => (),
        }
    }

    fn register(&mut self, element: &GlyphOrClass) {
        let class = match element {
            GlyphOrClass::Glyph(glyph) => GlyphClass::from(*glyph),
            GlyphOrClass::Inline(class) => class.clone(),
            GlyphOrClass::Class(_) => return,
        };
        if self.by_content.contains_key(&class) {
            return;
        }
        let name = self.next_name();
        log::trace!("synthetic class {name} has {} glyphs", class.len());
        self.by_content.insert(class.clone(), name.clone());
        self.synthetic.insert(name, class);
    }

    fn next_name(&mut self) -> ClassName {
        loop {
            let name = ClassName::from(format!("CLASS_{:03}", self.next_id));
            self.next_id += 1;
            if !self.source.classes.contains_key(&name) {
                return name;
            }
        }
    }

    /// The class an element matches.
    ///
    /// Returns `None` for a reference to an undeclared class; callers treat
    /// that as an empty class and report it.
    pub(crate) fn resolve(&self, element: &GlyphOrClass) -> Option<(ClassName, GlyphClass)> {
        let class = match element {
            GlyphOrClass::Class(name) => {
                return self
                    .source
                    .class(name)
                    .map(|class| (name.clone(), class.clone()))
            }
            GlyphOrClass::Glyph(glyph) => GlyphClass::from(*glyph),
            GlyphOrClass::Inline(class) => class.clone(),
        };
        match self.by_content.get(&class) {
            Some(name) => Some((name.clone(), class)),
            None => {
                log::warn!("element {element:?} was never registered");
                None
            }
        }
    }

    /// The glyphs of an element, without needing a class name.
    pub(crate) fn glyphs_of(&self, element: &GlyphOrClass) -> Option<GlyphClass> {
        match element {
            GlyphOrClass::Glyph(glyph) => Some(GlyphClass::from(*glyph)),
            GlyphOrClass::Inline(class) => Some(class.clone()),
            GlyphOrClass::Class(name) => self.source.class(name).cloned(),
        }
    }

    /// A display name for an element, as it would be written in the source.
    pub(crate) fn describe(&self, element: &GlyphOrClass) -> String {
        match element {
            GlyphOrClass::Glyph(glyph) => self.glyph_name(*glyph).to_string(),
            GlyphOrClass::Class(name) => format!("@{name}"),
            GlyphOrClass::Inline(class) => {
                let names = class
                    .iter()
                    .map(|g| self.glyph_name(g))
                    .collect::<Vec<_>>();
                format!("[{}]", names.join(" "))
            }
        }
    }

    pub(crate) fn glyph_name(&self, glyph: GlyphId) -> &str {
        self.source.glyphs.name(glyph)
    }

    #[cfg(test)]
    pub(crate) fn synthetic(&self) -> &IndexMap<ClassName, GlyphClass> {
        &self.synthetic
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::parse::parse_source;

    use super::*;

    #[test]
    fn synthetic_names_skip_declared() {
        let (source, diagnostics) = parse_source(
            "\
@class CLASS_001 = x y
@contextual {
    after x: a => b
    after [x y]: c => d
    after a: x => y
}
",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let opts = Opts::default();
        let mut session = Session::new(&source, &opts);
        session.register_lookup(&source.lookups[0]);
        let names = session.synthetic().keys().map(|n| n.as_str()).collect::<Vec<_>>();
        // x, a, [x y] (same content as CLASS_001, but still synthetic), c
        assert_eq!(names, ["CLASS_002", "CLASS_003", "CLASS_004", "CLASS_005"]);

        let x = source.glyphs.get("x").unwrap();
        let (name, class) = session.resolve(&GlyphOrClass::Glyph(x)).unwrap();
        assert_eq!(name, "CLASS_002");
        assert_eq!(class.items(), &[x]);
        assert!(session.resolve(&GlyphOrClass::Class("NOPE".into())).is_none());
    }
}
