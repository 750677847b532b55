//! The text-form IR builders.
//!
//! Emission appends to owned byte buffers; nothing is rewritten after being
//! emitted, so the same input produces the same IR byte-for-byte. The module
//! builder owns deduplicated string-literal globals and named type
//! definitions; the function builder owns register/label allocation and the
//! `terminated` flag that suppresses trailing code after `ret`/`br`.

use rustc_hash::FxHashMap;

/// Builds one output module.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    /// Named type definitions, in first-use order.
    type_defs: Vec<String>,
    type_names: FxHashMap<String, ()>,
    /// String-literal globals, interned by exact byte content.
    string_globals: Vec<String>,
    string_index: FxHashMap<String, String>,
    /// Other globals (static fields, vtables).
    globals: Vec<String>,
    /// External declarations, deduplicated.
    declares: Vec<String>,
    declare_index: FxHashMap<String, ()>,
    /// Finished function definitions.
    functions: Vec<String>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string literal; returns the global's name. Interning is
    /// keyed by exact byte equality, so `"a" + "b"` folded at compile time
    /// and a written `"ab"` share one global.
    pub fn intern_string(&mut self, content: &str) -> String {
        if let Some(name) = self.string_index.get(content) {
            return name.clone();
        }
        let name = format!("@.str.{}", self.string_index.len());
        let bytes = content.as_bytes();
        let encoded = encode_string_bytes(bytes);
        self.string_globals.push(format!(
            "{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
            name,
            bytes.len() + 1,
            encoded
        ));
        self.string_index.insert(content.to_string(), name.clone());
        name
    }

    /// Define a named type once (`%struct.Pair__I32 = type { i32, i32 }`).
    pub fn define_type(&mut self, name: &str, definition: &str) {
        if self.type_names.contains_key(name) {
            return;
        }
        self.type_names.insert(name.to_string(), ());
        self.type_defs.push(format!("{name} = type {definition}"));
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.type_names.contains_key(name)
    }

    /// Add an external declaration once, keyed by symbol.
    pub fn declare(&mut self, symbol: &str, line: &str) {
        if self.declare_index.contains_key(symbol) {
            return;
        }
        self.declare_index.insert(symbol.to_string(), ());
        self.declares.push(line.to_string());
    }

    pub fn add_global(&mut self, line: &str) {
        self.globals.push(line.to_string());
    }

    pub fn add_function(&mut self, body: String) {
        self.functions.push(body);
    }

    /// Assemble the final module text.
    pub fn finish(self, module_name: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("; ModuleID = '{module_name}'\n"));
        out.push_str(&format!("source_filename = \"{module_name}\"\n\n"));
        for def in &self.type_defs {
            out.push_str(def);
            out.push('\n');
        }
        if !self.type_defs.is_empty() {
            out.push('\n');
        }
        for global in &self.string_globals {
            out.push_str(global);
            out.push('\n');
        }
        for global in &self.globals {
            out.push_str(global);
            out.push('\n');
        }
        if !self.string_globals.is_empty() || !self.globals.is_empty() {
            out.push('\n');
        }
        for decl in &self.declares {
            out.push_str(decl);
            out.push('\n');
        }
        if !self.declares.is_empty() {
            out.push('\n');
        }
        for func in &self.functions {
            out.push_str(func);
            out.push('\n');
        }
        out
    }
}

/// Encode bytes for an LLVM `c"..."` constant.
fn encode_string_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' | b'\\' => out.push_str(&format!("\\{b:02X}")),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{b:02X}")),
        }
    }
    out
}

/// Builds one function's body.
#[derive(Debug)]
pub struct FuncBuilder {
    buf: String,
    next_reg: u32,
    next_label: u32,
    /// The label of the block currently being filled. Phi emission needs the
    /// *actual* predecessor, which nested control flow may have changed from
    /// the label originally branched to.
    pub current_block: String,
    /// Set once the current block has a terminator; suppresses further
    /// instructions until the next label.
    pub terminated: bool,
}

impl FuncBuilder {
    pub fn new() -> Self {
        FuncBuilder {
            buf: String::new(),
            next_reg: 0,
            next_label: 0,
            current_block: "entry".to_string(),
            terminated: false,
        }
    }

    /// A fresh SSA register.
    pub fn fresh_reg(&mut self) -> String {
        let reg = format!("%t{}", self.next_reg);
        self.next_reg += 1;
        reg
    }

    /// A fresh block label with a readable hint (`if.then3`).
    pub fn fresh_label(&mut self, hint: &str) -> String {
        let label = format!("{hint}{}", self.next_label);
        self.next_label += 1;
        label
    }

    /// Emit one instruction line (indented). Dropped silently when the
    /// current block is already terminated.
    pub fn emit(&mut self, line: &str) {
        if self.terminated {
            return;
        }
        self.buf.push_str("  ");
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    /// Emit a terminator (`ret`, `br`, `unreachable`) and mark the block.
    pub fn emit_term(&mut self, line: &str) {
        if self.terminated {
            return;
        }
        self.buf.push_str("  ");
        self.buf.push_str(line);
        self.buf.push('\n');
        self.terminated = true;
    }

    /// Start a new block.
    pub fn label(&mut self, name: &str) {
        self.buf.push_str(name);
        self.buf.push_str(":\n");
        self.current_block = name.to_string();
        self.terminated = false;
    }

    /// Emit a raw line without indentation (function header lines).
    pub fn raw(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    pub fn into_body(self) -> String {
        self.buf
    }
}

impl Default for FuncBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_interning_dedups_by_content() {
        let mut module = ModuleBuilder::new();
        let a = module.intern_string("abcd");
        let b = module.intern_string("abcd");
        let c = module.intern_string("ab");
        assert_eq!(a, b);
        assert_ne!(a, c);
        let text = module.finish("m");
        assert_eq!(text.matches("c\"abcd\\00\"").count(), 1);
    }

    #[test]
    fn terminated_blocks_drop_trailing_code() {
        let mut f = FuncBuilder::new();
        f.emit("%t0 = add i32 1, 2");
        f.emit_term("ret i32 %t0");
        f.emit("%t1 = add i32 3, 4");
        let body = f.into_body();
        assert!(body.contains("ret i32 %t0"));
        assert!(!body.contains("%t1"));
    }

    #[test]
    fn labels_reset_termination() {
        let mut f = FuncBuilder::new();
        f.emit_term("br label %next0");
        f.label("next0");
        assert!(!f.terminated);
        assert_eq!(f.current_block, "next0");
        f.emit("%t0 = add i32 1, 1");
        assert!(f.into_body().contains("next0:\n  %t0"));
    }

    #[test]
    fn escapes_quotes_and_non_printables() {
        let mut module = ModuleBuilder::new();
        module.intern_string("a\"b\n");
        let text = module.finish("m");
        assert!(text.contains("c\"a\\22b\\0A\\00\""));
    }

    #[test]
    fn declares_dedup_by_symbol() {
        let mut module = ModuleBuilder::new();
        module.declare("malloc", "declare ptr @malloc(i64)");
        module.declare("malloc", "declare ptr @malloc(i64)");
        let text = module.finish("m");
        assert_eq!(text.matches("declare ptr @malloc").count(), 1);
    }
}
