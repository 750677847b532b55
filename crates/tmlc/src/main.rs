//! The thin launcher for the modular toolchain.
//!
//! Deliberately tiny: `--help` and `--version` print locally without
//! touching any plugin; every other command loads the `tml_compiler`
//! plugin and delegates to its exported `compiler_main(argc, argv)`. When
//! no plugin artifact is installed (a plain `cargo install` build), the
//! statically linked compiler handles the command instead, so the single
//! binary stays fully functional.

use std::ffi::{c_char, c_int, CString};
use std::process;

use tml_plugin::Loader;

type CompilerMainFn = unsafe extern "C" fn(c_int, *const *const c_char) -> c_int;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    println!(
        "TML Compiler {VERSION}\n\
         \n\
         Usage: tml <command> [options]\n\
         \n\
         Commands:\n\
         \x20 build   <file>    Compile a TML source file\n\
         \x20 run     <file>    Build and run immediately\n\
         \x20 check   <file>    Type check without codegen\n\
         \x20 test              Run tests\n\
         \x20 fmt     <file>    Format source code\n\
         \x20 lint    <file>    Lint source code\n\
         \x20 lex     <file>    Show lexer tokens\n\
         \x20 parse   <file>    Show parse tree\n\
         \x20 init              Initialize a new project\n\
         \x20 mcp               Start MCP server\n\
         \x20 explain <code>    Explain an error code\n\
         \n\
         Flags:\n\
         \x20 --help, -h        Show this help\n\
         \x20 --version, -V     Show version\n\
         \x20 --verbose, -v     Enable verbose output"
    );
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();

    // No arguments: help, no plugins touched.
    if args.len() < 2 {
        print_usage();
        process::exit(0);
    }
    match args[1].as_str() {
        "--help" | "-h" => {
            print_usage();
            process::exit(0);
        }
        "--version" | "-V" => {
            println!("tml {VERSION}");
            process::exit(0);
        }
        _ => {}
    }

    // Everything else goes to the compiler plugin.
    let mut loader = Loader::new();
    match loader.load("tml_compiler") {
        Ok(_) => {
            let plugin = loader.get("tml_compiler").expect("just loaded");
            let compiler_main = unsafe {
                plugin
                    .get_symbol::<CompilerMainFn>(b"compiler_main\0")
                    .map(|symbol| *symbol)
            };
            let Some(compiler_main) = compiler_main else {
                eprintln!("error: compiler plugin does not export 'compiler_main'");
                process::exit(1);
            };
            let code = call_compiler_main(compiler_main, &args);
            loader.unload_all();
            process::exit(code);
        }
        Err(err) => {
            // No installed plugin: fall back to the statically linked
            // compiler so a bare binary still works.
            log::debug!("compiler plugin unavailable ({err}); using static fallback");
            process::exit(tml_compiler::run(args));
        }
    }
}

fn call_compiler_main(entry: CompilerMainFn, args: &[String]) -> i32 {
    let owned: Vec<CString> = args
        .iter()
        .map(|a| CString::new(a.as_str()).unwrap_or_default())
        .collect();
    let pointers: Vec<*const c_char> = owned.iter().map(|c| c.as_ptr()).collect();
    unsafe { entry(pointers.len() as c_int, pointers.as_ptr()) }
}
