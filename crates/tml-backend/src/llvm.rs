//! IR text to object files.
//!
//! With the `llvm` feature the IR is parsed in process and compiled through
//! a target machine; otherwise the IR lands in a temp file and a system
//! `clang` drives the compilation. Both paths honor the same options.

use std::path::Path;
use std::process::Command;

/// Options for one IR compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Optimization level 0-3.
    pub opt_level: u8,
    /// Emit debug information.
    pub debug_info: bool,
    /// Target triple; empty selects the host.
    pub target_triple: String,
    /// CPU name (`native`, `skylake`, ...).
    pub cpu: String,
    /// CPU features (`+avx2,+fma`).
    pub features: String,
    /// Position-independent code (shared libraries).
    pub position_independent: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            opt_level: 0,
            debug_info: false,
            target_triple: String::new(),
            cpu: "native".to_string(),
            features: String::new(),
            position_independent: false,
        }
    }
}

/// Compile IR text to an on-disk object file.
pub fn compile_ir_to_object(
    ir: &str,
    output_path: &Path,
    options: &CompileOptions,
) -> Result<(), String> {
    #[cfg(feature = "llvm")]
    {
        in_process::compile(ir, output_path, options)
    }
    #[cfg(not(feature = "llvm"))]
    {
        subprocess_compile(ir, output_path, options)
    }
}

/// Compile IR text to an in-memory object buffer (no disk I/O for the
/// object itself).
pub fn compile_ir_to_buffer(ir: &str, options: &CompileOptions) -> Result<Vec<u8>, String> {
    #[cfg(feature = "llvm")]
    {
        in_process::compile_to_buffer(ir, options)
    }
    #[cfg(not(feature = "llvm"))]
    {
        let dir = tempfile::tempdir().map_err(|e| format!("temp dir: {e}"))?;
        let out = dir.path().join("out.o");
        subprocess_compile(ir, &out, options)?;
        std::fs::read(&out).map_err(|e| format!("read object: {e}"))
    }
}

/// Whether the in-process backend is linked into this build.
pub fn in_process_available() -> bool {
    cfg!(feature = "llvm")
}

/// Shell out to a clang-style driver.
#[cfg_attr(feature = "llvm", allow(dead_code))]
fn subprocess_compile(
    ir: &str,
    output_path: &Path,
    options: &CompileOptions,
) -> Result<(), String> {
    let dir = tempfile::tempdir().map_err(|e| format!("temp dir: {e}"))?;
    let ir_path = dir.path().join("module.ll");
    std::fs::write(&ir_path, ir).map_err(|e| format!("write IR: {e}"))?;

    let driver = find_clang().ok_or_else(|| {
        "no in-process backend and no clang found on PATH; install clang or build with the \
         `llvm` feature"
            .to_string()
    })?;

    let mut cmd = Command::new(driver);
    cmd.arg("-c")
        .arg(&ir_path)
        .arg("-o")
        .arg(output_path)
        .arg(format!("-O{}", options.opt_level.min(3)))
        // The emitter's unambiguous constructs trip strict warnings.
        .arg("-Wno-override-module");
    if options.debug_info {
        cmd.arg("-g");
    }
    if !options.target_triple.is_empty() {
        cmd.arg(format!("--target={}", options.target_triple));
    }
    if options.position_independent {
        cmd.arg("-fPIC");
    }

    log::debug!("subprocess IR compile: {cmd:?}");
    let output = cmd
        .output()
        .map_err(|e| format!("failed to invoke clang: {e}"))?;
    if !output.status.success() {
        return Err(format!(
            "clang failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(())
}

fn find_clang() -> Option<&'static str> {
    for candidate in ["clang-21", "clang-20", "clang-19", "clang-18", "clang"] {
        if Command::new(candidate)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
        {
            return Some(candidate);
        }
    }
    None
}

#[cfg(feature = "llvm")]
mod in_process {
    //! The linked-LLVM path: parse the IR, configure a target machine, emit.
    //!
    //! Each call creates its own context; the CGU pool relies on contexts
    //! never being shared across threads.

    use std::path::Path;

    use inkwell::context::Context;
    use inkwell::memory_buffer::MemoryBuffer;
    use inkwell::targets::{
        CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple,
    };
    use inkwell::OptimizationLevel;

    use super::CompileOptions;

    pub fn compile(ir: &str, output_path: &Path, options: &CompileOptions) -> Result<(), String> {
        let context = Context::create();
        let (module, machine) = prepare(&context, ir, options)?;
        machine
            .write_to_file(&module, FileType::Object, output_path)
            .map_err(|e| format!("object emission failed: {e}"))
    }

    pub fn compile_to_buffer(ir: &str, options: &CompileOptions) -> Result<Vec<u8>, String> {
        let context = Context::create();
        let (module, machine) = prepare(&context, ir, options)?;
        let buffer = machine
            .write_to_memory_buffer(&module, FileType::Object)
            .map_err(|e| format!("object emission failed: {e}"))?;
        Ok(buffer.as_slice().to_vec())
    }

    fn prepare<'ctx>(
        context: &'ctx Context,
        ir: &str,
        options: &CompileOptions,
    ) -> Result<(inkwell::module::Module<'ctx>, TargetMachine), String> {
        Target::initialize_all(&InitializationConfig::default());

        let buffer = MemoryBuffer::create_from_memory_range_copy(ir.as_bytes(), "module");
        let module = context
            .create_module_from_ir(buffer)
            .map_err(|e| format!("IR parse failed: {e}"))?;

        let triple = if options.target_triple.is_empty() {
            TargetMachine::get_default_triple()
        } else {
            TargetTriple::create(&options.target_triple)
        };
        module.set_triple(&triple);

        let target =
            Target::from_triple(&triple).map_err(|e| format!("invalid triple: {e}"))?;
        let opt = match options.opt_level {
            0 => OptimizationLevel::None,
            1 => OptimizationLevel::Less,
            2 => OptimizationLevel::Default,
            _ => OptimizationLevel::Aggressive,
        };
        let reloc = if options.position_independent {
            RelocMode::PIC
        } else {
            RelocMode::Default
        };
        let machine = target
            .create_target_machine(
                &triple,
                &options.cpu,
                &options.features,
                opt,
                reloc,
                CodeModel::Default,
            )
            .ok_or_else(|| "failed to create target machine".to_string())?;
        Ok((module, machine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_target_host() {
        let options = CompileOptions::default();
        assert_eq!(options.opt_level, 0);
        assert!(options.target_triple.is_empty());
        assert_eq!(options.cpu, "native");
    }
}
