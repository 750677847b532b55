//! The IR generator.
//!
//! Walks the typed, monomorphized program and appends text-form IR to the
//! module builder. Emission order is deterministic: module-level functions
//! first (in declaration order), then queue-driven instantiations in
//! first-request order.
//!
//! Per-function state lives on the generator and is reset by
//! [`IrGen::emit_function`]: the scope stack of locals, the loop-label
//! stack for `break`/`continue`, and the drop-scope stack that releases
//! resources on every exit path.

pub mod builtins;
pub mod control;
pub mod expr;
pub mod intrinsics;

use rustc_hash::{FxHashMap, FxHashSet};

use tml_ast as ast;
use tml_common::{DiagnosticBag, Span};
use tml_typeck::{Type, TypeEnv, TypeId, TypedAst};

use crate::ir::{FuncBuilder, ModuleBuilder};
use crate::layout;
use crate::mangle;
use crate::mono::{MonoItem, MonoQueue, MonoRequest};

/// Options for one emission run.
#[derive(Debug, Clone, Default)]
pub struct GenOptions {
    /// The suite prefix for local symbols (empty = no prefix).
    pub suite: String,
    /// Emit `emit_coverage` hooks at intrinsic and builtin call sites.
    pub coverage: bool,
}

/// A value produced by expression emission: a register (or literal) plus its
/// LLVM type string. Unit values use type `"void"` and register `"0"`.
#[derive(Debug, Clone)]
pub struct Val {
    pub reg: String,
    pub ty: String,
}

impl Val {
    pub fn new(reg: impl Into<String>, ty: impl Into<String>) -> Val {
        Val {
            reg: reg.into(),
            ty: ty.into(),
        }
    }

    pub fn unit() -> Val {
        Val::new("0", "void")
    }

    pub fn is_unit(&self) -> bool {
        self.ty == "void"
    }
}

/// A local variable: its stack slot and semantic type.
#[derive(Debug, Clone)]
pub struct VarInfo {
    pub ptr: String,
    pub ty: TypeId,
}

/// An entry in a drop scope: a slot whose type has a user `drop` to run at
/// scope exit.
#[derive(Debug, Clone)]
pub struct DropEntry {
    pub ptr: String,
    pub symbol: String,
}

/// An enclosing loop: branch targets for `continue`/`break`, the index of
/// the first drop scope belonging to the loop body, and the iteration's
/// stacksave register. Early exits drop exactly the scope suffix from
/// `drop_depth` and restore the frame; enclosing scopes stay live and drop
/// where they close.
#[derive(Debug, Clone)]
pub struct LoopFrame {
    pub continue_label: String,
    pub break_label: String,
    pub drop_depth: usize,
    pub stack_save: Option<String>,
}

pub struct IrGen<'a> {
    pub env: &'a mut TypeEnv,
    pub typed: &'a TypedAst,
    pub module: ModuleBuilder,
    pub queue: MonoQueue,
    pub options: GenOptions,
    pub errors: DiagnosticBag,

    // Per-function state.
    pub f: FuncBuilder,
    pub locals: Vec<FxHashMap<String, VarInfo>>,
    /// One frame per enclosing loop, innermost last.
    pub loop_stack: Vec<LoopFrame>,
    pub drop_scopes: Vec<Vec<DropEntry>>,
    /// The active monomorphization substitution.
    pub subst: FxHashMap<String, TypeId>,
    pub const_subst: FxHashMap<String, u64>,
    pub return_type: TypeId,
    pub is_async: bool,
    /// Counter for closure bodies hoisted out of the current function.
    pub closure_counter: u32,
    pub current_symbol: String,
    /// Globals (statics, vtables) already defined in this module.
    pub statics_defined: FxHashSet<String>,
    /// Linkage keyword for the function being emitted. Queue-driven
    /// instantiations use `linkonce_odr` so compilation groups can emit the
    /// same instantiation and deduplicate at link time.
    pub current_linkage: &'static str,
}

impl<'a> IrGen<'a> {
    pub fn new(env: &'a mut TypeEnv, typed: &'a TypedAst, options: GenOptions) -> Self {
        let unit = env.interner.unit();
        IrGen {
            env,
            typed,
            module: ModuleBuilder::new(),
            queue: MonoQueue::new(),
            options,
            errors: DiagnosticBag::new(),
            f: FuncBuilder::new(),
            locals: Vec::new(),
            loop_stack: Vec::new(),
            drop_scopes: Vec::new(),
            subst: FxHashMap::default(),
            const_subst: FxHashMap::default(),
            return_type: unit,
            is_async: false,
            closure_counter: 0,
            current_symbol: String::new(),
            statics_defined: FxHashSet::default(),
            current_linkage: "",
        }
    }

    /// Emit a whole program: runtime declarations, every non-generic
    /// function, then the instantiation queue to fixpoint.
    pub fn emit_program(&mut self, modules: &[ast::Module], module_name: &str) -> String {
        self.declare_runtime();

        for module in modules {
            for func in &module.functions {
                if func.type_params.is_empty() {
                    // The entry point keeps its linker-visible name.
                    let symbol = if func.name == "main" {
                        "main".to_string()
                    } else {
                        mangle::apply_prefix(&func.name, &self.options.suite, module.is_library)
                    };
                    self.emit_function(&symbol, func, FxHashMap::default(), None);
                }
            }
            // Impl and class methods are emitted on demand: every call site
            // (including vtables, drops, and setters) enqueues its target,
            // so reachable methods land exactly once, with linkonce_odr
            // linkage that merges across compilation groups.
        }

        self.drain_queue(modules);
        self.current_linkage = "";

        let module = std::mem::take(&mut self.module);
        module.finish(module_name)
    }

    /// Drain the monomorphization queue: each instantiation may enqueue
    /// further ones, so loop until empty.
    fn drain_queue(&mut self, modules: &[ast::Module]) {
        self.current_linkage = "linkonce_odr ";
        while let Some(item) = self.queue.pop() {
            match item.request {
                MonoRequest::Layout {
                    ref type_name,
                    ref type_args,
                } => {
                    self.emit_type_definition(type_name, type_args);
                }
                MonoRequest::Function {
                    ref name,
                    ref substitution,
                } => {
                    let Some(def) = self.env.functions.get(name).cloned() else {
                        continue;
                    };
                    let symbol =
                        mangle::apply_prefix(&item.symbol, &self.options.suite, item.is_library);
                    self.emit_function(&symbol, &def.func, substitution.clone(), None);
                }
                MonoRequest::Derived {
                    ref type_name,
                    ref type_args,
                    ref method,
                } => {
                    let symbol =
                        mangle::apply_prefix(&item.symbol, &self.options.suite, item.is_library);
                    self.emit_derived_method(&symbol, type_name, type_args, method);
                }
                MonoRequest::Method {
                    ref type_name,
                    ref type_args,
                    ref method,
                    ref substitution,
                } => {
                    let method_def = self.find_method_ast(modules, type_name, method);
                    let Some(func) = method_def else { continue };
                    let symbol =
                        mangle::apply_prefix(&item.symbol, &self.options.suite, item.is_library);
                    let receiver = self.env.interner.named(type_name.clone(), type_args.clone());
                    let this = func.this.map(|_| receiver);
                    self.emit_function(&symbol, &func, substitution.clone(), this);
                }
            }
        }
    }

    fn find_method_ast(
        &self,
        modules: &[ast::Module],
        type_name: &str,
        method: &str,
    ) -> Option<ast::Function> {
        for module in modules {
            for block in &module.impls {
                let matches_target = match &block.target {
                    ast::TypeExpr::Named { name, .. } => name == type_name,
                    _ => false,
                };
                if !matches_target {
                    continue;
                }
                if let Some(m) = block.methods.iter().find(|m| m.name == method) {
                    return Some(m.clone());
                }
            }
            for class in &module.classes {
                if class.name != type_name {
                    continue;
                }
                if let Some(m) = class.methods.iter().find(|m| m.name == method) {
                    return Some(m.clone());
                }
            }
        }
        None
    }

    // ── type definitions ─────────────────────────────────────────────

    /// Request a named type's layout; emits the definition on first use.
    pub fn ensure_type_defined(&mut self, ty: TypeId) {
        let (name, args) = match self.env.interner.get(ty).clone() {
            Type::Named { name, args, .. } => (name, args),
            _ => return,
        };
        let is_enum_like = self.env.enums.contains_key(&name)
            || matches!(name.as_str(), "Maybe" | "Outcome" | "Ordering" | "Poll");
        let is_struct = self.env.structs.contains_key(&name);
        if !is_enum_like && !is_struct {
            return;
        }
        // `@flags` enums are bare integers; no named type needed.
        if let Some(def) = self.env.enums.get(&name) {
            if def.flags.is_some() {
                return;
            }
        }
        let symbol = mangle::mangle_instantiation(self.env, &name, &args, &[]);
        let ir_name = if is_struct {
            format!("%struct.{symbol}")
        } else {
            format!("%enum.{symbol}")
        };
        if self.module.has_type(&ir_name) {
            return;
        }
        self.emit_type_definition(&name, &args);
    }

    fn emit_type_definition(&mut self, name: &str, args: &[TypeId]) {
        let symbol = mangle::mangle_instantiation(self.env, name, args, &[]);
        if self.env.structs.contains_key(name) {
            let fields = layout::instantiated_fields(self.env, name, args);
            // Field types may themselves be named types.
            let mut parts = Vec::with_capacity(fields.len());
            for (_, field_ty) in &fields {
                self.ensure_type_defined(*field_ty);
                let ll = layout::ll_type(self.env, *field_ty);
                parts.push(if ll == "void" { "{}".to_string() } else { ll });
            }
            let def = if parts.is_empty() {
                "{}".to_string()
            } else {
                format!("{{ {} }}", parts.join(", "))
            };
            self.module.define_type(&format!("%struct.{symbol}"), &def);
        } else {
            // Enum-shaped: { i32 tag, [N x i8] payload }.
            for (_, payload) in layout::enum_variants(self.env, name, args) {
                for p in payload {
                    self.ensure_type_defined(p);
                }
            }
            let payload = layout::enum_payload_size(self.env, name, args);
            let def = if payload == 0 {
                "{ i32 }".to_string()
            } else {
                format!("{{ i32, [{payload} x i8] }}")
            };
            self.module.define_type(&format!("%enum.{symbol}"), &def);
        }
    }

    // ── runtime interface ────────────────────────────────────────────

    fn declare_runtime(&mut self) {
        let decls: &[(&str, &str)] = &[
            ("malloc", "declare ptr @malloc(i64)"),
            ("free", "declare void @free(ptr)"),
            ("strlen", "declare i64 @strlen(ptr)"),
            ("str_eq", "declare i1 @str_eq(ptr, ptr)"),
            ("str_concat_opt", "declare ptr @str_concat_opt(ptr, ptr)"),
            ("panic", "declare void @panic(ptr)"),
            ("print_str", "declare void @print_str(ptr)"),
            ("print_i64", "declare void @print_i64(i64)"),
            ("list_new", "declare ptr @list_new(i64)"),
            ("list_push", "declare void @list_push(ptr, ptr)"),
            ("list_len", "declare i64 @list_len(ptr)"),
            ("list_get", "declare ptr @list_get(ptr, i64)"),
            ("list_set", "declare void @list_set(ptr, i64, ptr)"),
            ("list_pop", "declare ptr @list_pop(ptr)"),
            ("list_free", "declare void @list_free(ptr)"),
            ("file_is_open", "declare i1 @file_is_open(ptr)"),
            ("file_read_line", "declare ptr @file_read_line(ptr)"),
            ("file_write_str", "declare i64 @file_write_str(ptr, ptr)"),
            ("file_size", "declare i64 @file_size(ptr)"),
            ("file_close", "declare void @file_close(ptr)"),
            ("file_flush", "declare void @file_flush(ptr)"),
            (
                "llvm.memcpy.p0.p0.i64",
                "declare void @llvm.memcpy.p0.p0.i64(ptr, ptr, i64, i1)",
            ),
            (
                "llvm.memmove.p0.p0.i64",
                "declare void @llvm.memmove.p0.p0.i64(ptr, ptr, i64, i1)",
            ),
            (
                "llvm.memset.p0.i64",
                "declare void @llvm.memset.p0.i64(ptr, i8, i64, i1)",
            ),
            ("llvm.stacksave", "declare ptr @llvm.stacksave()"),
            ("llvm.stackrestore", "declare void @llvm.stackrestore(ptr)"),
            ("llvm.expect.i1", "declare i1 @llvm.expect.i1(i1, i1)"),
            ("llvm.assume", "declare void @llvm.assume(i1)"),
        ];
        for (symbol, line) in decls {
            self.module.declare(symbol, line);
        }
        if self.options.coverage {
            self.module
                .declare("emit_coverage", "declare void @emit_coverage(ptr)");
        }
    }

    /// Record a coverage hit for an intrinsic or builtin method call site.
    pub fn coverage_hook(&mut self, name: &str) {
        if !self.options.coverage {
            return;
        }
        let global = self.module.intern_string(name);
        self.f
            .emit(&format!("call void @emit_coverage(ptr {global})"));
    }

    // ── function emission ────────────────────────────────────────────

    /// Emit one function under a substitution. `this_ty` is the receiver
    /// type for methods.
    pub fn emit_function(
        &mut self,
        symbol: &str,
        func: &ast::Function,
        subst: FxHashMap<String, TypeId>,
        this_ty: Option<TypeId>,
    ) {
        let Some(body) = &func.body else { return };

        // Reset per-function state.
        self.f = FuncBuilder::new();
        self.locals = vec![FxHashMap::default()];
        self.loop_stack.clear();
        self.drop_scopes = vec![Vec::new()];
        self.subst = subst;
        self.const_subst = FxHashMap::default();
        self.is_async = func.is_async;
        self.closure_counter = 0;
        self.current_symbol = symbol.to_string();

        // Resolve the signature under the substitution.
        let scope = tml_typeck::ParamScope::from_decl(&func.type_params);
        let mut param_tys: Vec<(String, TypeId)> = Vec::new();
        if let Some(this) = this_ty {
            param_tys.push(("this".to_string(), this));
        }
        for param in &func.params {
            let ty = match self.env.resolve_type_expr(&param.ty, &scope) {
                Ok(id) => self.apply_subst(id),
                Err(_) => self.env.interner.unit(),
            };
            param_tys.push((param.name.clone(), ty));
        }
        let declared_ret = match &func.return_type {
            Some(ty) => match self.env.resolve_type_expr(ty, &scope) {
                Ok(id) => self.apply_subst(id),
                Err(_) => self.env.interner.unit(),
            },
            None => self.env.interner.unit(),
        };
        // Async functions return Poll[T] at the IR level.
        self.return_type = declared_ret;
        let ir_ret = if func.is_async {
            let poll = self.env.interner.named("Poll", vec![declared_ret]);
            self.ensure_type_defined(poll);
            poll
        } else {
            declared_ret
        };

        for (_, ty) in &param_tys {
            self.ensure_type_defined(*ty);
        }
        self.ensure_type_defined(ir_ret);

        let ret_ll = layout::ll_type(self.env, ir_ret);
        let linkage = self.current_linkage;
        let mut header = format!("define {linkage}{ret_ll} @{symbol}(");
        let mut first = true;
        for (name, ty) in &param_tys {
            // The receiver always arrives as a pointer so methods can
            // mutate fields in place.
            let ll = if name == "this" {
                "ptr".to_string()
            } else {
                layout::ll_type(self.env, *ty)
            };
            if ll == "void" {
                continue;
            }
            if !first {
                header.push_str(", ");
            }
            first = false;
            header.push_str(&format!("{ll} %arg.{name}"));
        }
        header.push_str(") {");
        self.f.raw(&header);
        self.f.label("entry");

        // Locals are stack slots; parameters spill on entry so assignment
        // and reference-taking treat them uniformly. The receiver pointer
        // is already a slot for the receiver value.
        let entries: Vec<(String, TypeId)> = param_tys.clone();
        for (name, ty) in &entries {
            if name == "this" {
                self.declare_local(name, "%arg.this".to_string(), *ty);
                continue;
            }
            let ll = layout::ll_type(self.env, *ty);
            if ll == "void" {
                continue;
            }
            let slot = self.f.fresh_reg();
            self.f.emit(&format!("{slot} = alloca {ll}"));
            self.f
                .emit(&format!("store {ll} %arg.{name}, ptr {slot}"));
            self.declare_local(name, slot, *ty);
        }

        let result = self.emit_block(body);

        // Implicit return of the trailing value; otherwise ret void/zero.
        if !self.f.terminated {
            self.emit_scope_drops_all();
            match result {
                Some(val) if !val.is_unit() => {
                    let source = body.trailing.as_ref().map(|e| self.node_type(e.id));
                    let coerced = self.coerce_to_return(val, source);
                    self.emit_wrapped_return(Some(coerced));
                }
                _ => {
                    self.emit_wrapped_return(None);
                }
            }
        }

        self.f.raw("}");
        let body_text = std::mem::take(&mut self.f).into_body();
        self.module.add_function(body_text);
    }

    /// Apply the active substitution to a type.
    pub fn apply_subst(&mut self, ty: TypeId) -> TypeId {
        self.env
            .interner
            .substitute(ty, &self.subst, &self.const_subst)
    }

    /// The concrete type of an expression node under the active substitution.
    pub fn node_type(&mut self, id: ast::NodeId) -> TypeId {
        match self.typed.type_of(id) {
            Some(ty) => self.apply_subst(ty),
            None => self.env.interner.unit(),
        }
    }

    // ── locals / scopes ──────────────────────────────────────────────

    pub fn declare_local(&mut self, name: &str, ptr: String, ty: TypeId) {
        // Resources with a user `drop` register in the current drop scope at
        // declaration; exits release in reverse registration order.
        if let Some(drop_symbol) = self.drop_symbol_for(ty) {
            if let Some(scope) = self.drop_scopes.last_mut() {
                scope.push(DropEntry {
                    ptr: ptr.clone(),
                    symbol: drop_symbol,
                });
            }
        }
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.to_string(), VarInfo { ptr, ty });
        }
    }

    pub fn lookup_local(&self, name: &str) -> Option<VarInfo> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
    }

    pub fn push_scope(&mut self) {
        self.locals.push(FxHashMap::default());
        self.drop_scopes.push(Vec::new());
    }

    /// Pop a scope, emitting its drops (unless the block already terminated).
    pub fn pop_scope(&mut self) {
        if let Some(entries) = self.drop_scopes.pop() {
            if !self.f.terminated {
                for entry in entries.iter().rev() {
                    let symbol = entry.symbol.clone();
                    let ptr = entry.ptr.clone();
                    self.f.emit(&format!("call void @{symbol}(ptr {ptr})"));
                }
            }
        }
        self.locals.pop();
    }

    /// Emit drops for every open scope, innermost first. Used before
    /// `return`, which leaves all of them.
    pub fn emit_scope_drops_all(&mut self) {
        self.emit_scope_drops_from(0);
    }

    /// Emit drops for the scope suffix starting at `depth`, innermost
    /// first, without closing the scopes. `break`/`continue` use the
    /// enclosing loop frame's recorded depth so outer scopes keep their
    /// values alive.
    pub fn emit_scope_drops_from(&mut self, depth: usize) {
        let pending: Vec<DropEntry> = self
            .drop_scopes
            .get(depth..)
            .unwrap_or(&[])
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev().cloned())
            .collect();
        for entry in pending {
            self.f
                .emit(&format!("call void @{}(ptr {})", entry.symbol, entry.ptr));
        }
    }

    /// The drop function symbol for a type, when its impl declares `drop`.
    fn drop_symbol_for(&mut self, ty: TypeId) -> Option<String> {
        let name = match self.env.interner.get(ty) {
            Type::Named { name, .. } => name.clone(),
            _ => return None,
        };
        let indices = self.env.impls_by_type.get(&name)?.clone();
        for idx in indices {
            if self.env.impls[idx].method("drop").is_some() {
                let args = match self.env.interner.get(ty) {
                    Type::Named { args, .. } => args.clone(),
                    _ => Vec::new(),
                };
                let symbol = mangle::method_symbol(self.env, &name, &args, "drop");
                let is_library = self.env.impls[idx].is_library;
                self.enqueue_method(&name, &args, "drop", FxHashMap::default(), is_library);
                return Some(mangle::apply_prefix(&symbol, &self.options.suite, is_library));
            }
        }
        None
    }

    // ── queue helpers ────────────────────────────────────────────────

    pub fn enqueue_function(
        &mut self,
        name: &str,
        type_args: &[TypeId],
        substitution: FxHashMap<String, TypeId>,
        is_library: bool,
    ) -> String {
        let symbol = mangle::function_symbol(self.env, name, type_args);
        self.queue.enqueue(MonoItem {
            symbol: symbol.clone(),
            request: MonoRequest::Function {
                name: name.to_string(),
                substitution,
            },
            is_library,
        });
        mangle::apply_prefix(&symbol, &self.options.suite, is_library)
    }

    pub fn enqueue_method(
        &mut self,
        type_name: &str,
        type_args: &[TypeId],
        method: &str,
        substitution: FxHashMap<String, TypeId>,
        is_library: bool,
    ) -> String {
        let symbol = mangle::method_symbol(self.env, type_name, type_args, method);
        self.queue.enqueue(MonoItem {
            symbol: symbol.clone(),
            request: MonoRequest::Method {
                type_name: type_name.to_string(),
                type_args: type_args.to_vec(),
                method: method.to_string(),
                substitution,
            },
            is_library,
        });
        mangle::apply_prefix(&symbol, &self.options.suite, is_library)
    }

    // ── errors ───────────────────────────────────────────────────────

    pub fn codegen_error(&mut self, code: &str, message: impl Into<String>, span: Span) {
        self.errors
            .error(code.to_string(), message.into(), span);
    }
}
