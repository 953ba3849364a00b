use crate::error::{ErrorKind, PpResult, Report, SourceLocation};
use crate::symbols::{SymId, sym_text};
use crate::token::Token;
use std::collections::HashMap;

/// Macros whose expansion is computed from the expansion position
/// instead of a stored replacement list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    File,
    Line,
}

#[derive(Debug, Clone)]
pub struct MacroParams {
    pub names: Vec<SymId>,
    pub variadic: bool,
    /// `__VA_ARGS__`, or the GNU name from `#define f(args...)`.
    pub va_name: SymId,
    /// Defined GNU-style with no comma before the ellipsis.
    pub named_varargs: bool,
}

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: SymId,
    pub name_loc: SourceLocation,
    /// `None` for object-like macros.
    pub params: Option<MacroParams>,
    pub body: Vec<Token>,
    pub predefined: bool,
    pub builtin: Option<Builtin>,
}

impl MacroDef {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }
}

fn params_eq(a: &Option<MacroParams>, b: &Option<MacroParams>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.names == b.names && a.variadic == b.variadic && a.va_name == b.va_name
        }
        _ => false,
    }
}

/// Token-by-token comparison where whitespace runs are equivalent.
/// Replacement lists are stored with surrounding whitespace trimmed, so
/// only the between-token spacing matters.
fn replacement_eq(a: &[Token], b: &[Token]) -> bool {
    fn significant(toks: &[Token]) -> Vec<(bool, &Token)> {
        let mut out = Vec::new();
        let mut ws = false;
        for tok in toks {
            if tok.is_whitespace() {
                ws = true;
                continue;
            }
            out.push((ws, tok));
            ws = false;
        }
        out
    }
    let a = significant(a);
    let b = significant(b);
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|((wa, ta), (wb, tb))| wa == wb && ta.same(tb))
}

/// Two definitions are identical iff the kind matches, parameters match
/// pairwise, and the replacement lists match token-by-token.
pub fn same_definition(a: &MacroDef, b: &MacroDef) -> bool {
    params_eq(&a.params, &b.params) && replacement_eq(&a.body, &b.body)
}

/// Name → definition mapping; exactly one definition per name.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<SymId, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a definition. An identical redefinition is silently
    /// allowed; a non-identical one is an error citing both positions.
    /// Redefining a predefined macro replaces it silently.
    pub fn define(&mut self, def: MacroDef, report: &mut Report) -> PpResult<()> {
        if let Some(prev) = self.macros.get(&def.name)
            && !prev.predefined
            && !same_definition(prev, &def)
        {
            report.error(
                ErrorKind::Macro,
                def.name_loc,
                format!(
                    "macro '{}' redefined differently, previous definition at {}",
                    sym_text(def.name),
                    prev.name_loc
                ),
            )?;
        }
        self.macros.insert(def.name, def);
        Ok(())
    }

    /// Installs without the redefinition check; for predefined macros.
    pub fn install(&mut self, def: MacroDef) {
        self.macros.insert(def.name, def);
    }

    /// Silent whether or not the name is defined.
    pub fn undefine(&mut self, name: SymId) {
        self.macros.remove(&name);
    }

    pub fn get(&self, name: SymId) -> Option<&MacroDef> {
        self.macros.get(&name)
    }

    pub fn is_defined(&self, name: SymId) -> bool {
        self.macros.contains_key(&name)
    }
}
