use minilisp::Interpreter;
use minilisp::ast::{Callable, Value};
use minilisp::builtinops::get_builtin_ops;
use minilisp::environment::Arity;
use minilisp::parser::ParseConfig;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

fn main() {
    init_tracing();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Log to stderr, but only when RUST_LOG is set
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn run_repl() {
    println!("minilisp - a minimal S-expression interpreter");
    println!("Enter programs like: (add 4 3 10)");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let interpreter = Interpreter::new().with_config(ParseConfig {
        handle_comments: true,
    });

    loop {
        match rl.readline("minilisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&interpreter);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                if let Some(source) = line.strip_prefix(":tree") {
                    print_tree(source.trim());
                    continue;
                }

                match interpreter.run(line) {
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn describe_arity(arity: Arity) -> String {
    match arity {
        Arity::Exact(n) => format!("{n}"),
        Arity::AtLeast(n) => format!("{n}+"),
        Arity::Range(min, max) => format!("{min}-{max}"),
        Arity::Any => "any".to_owned(),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :help        - Show this help message");
    println!("  :env         - Show current environment bindings");
    println!("  :tree <expr> - Show the parsed tree of an expression");
    println!("  :quit        - Exit the interpreter");
    println!("  Ctrl+C       - Exit the interpreter");
    println!();
    println!("Operations (name, argument count, description):");
    for op in get_builtin_ops() {
        let kind = if op.is_special_form() { " (form)" } else { "" };
        println!(
            "  {:<6} {:<5} {}{kind}",
            op.id,
            describe_arity(op.arity),
            op.summary
        );
    }
    println!("  {:<6} {:<5} concatenate and print a line", "print", "1+");
    println!();
    println!("Examples:");
    println!("  (str \"Hello \" 'World!')");
    println!("  (do (def x 10 (if (gt x 5) \"large\" \"small\")))");
    println!("  (do (defn twice (args n) (multi n 2)) (twice 21))");
    println!();
}

fn print_environment(interpreter: &Interpreter) {
    let bindings = interpreter.environment().get_all_bindings();

    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Callable(Callable::Builtin { .. } | Callable::SpecialForm { .. }) => {
                builtins.push(name)
            }
            Value::Bool(_) if name == "true" || name == "false" => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    println!("Built-in bindings ({}):", builtins.len());
    let mut col = 0;
    for name in builtins {
        print!("  {name:<10}");
        col += 1;
        if col % 6 == 0 {
            println!();
        }
    }
    if col % 6 != 0 {
        println!();
    }
    println!();

    if user_defined.is_empty() {
        println!("No user definitions yet.");
    } else {
        println!("User definitions ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}

#[cfg(feature = "json")]
fn print_tree(source: &str) {
    let tree = minilisp::parse(source).and_then(|node| minilisp::json::node_to_json_string(&node));
    match tree {
        Ok(json) => println!("{json}"),
        Err(e) => println!("Error: {e}"),
    }
}

#[cfg(not(feature = "json"))]
fn print_tree(source: &str) {
    match minilisp::parse(source) {
        Ok(node) => println!("{node:#?}"),
        Err(e) => println!("Error: {e}"),
    }
}
