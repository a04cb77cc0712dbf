use argh::FromArgs;
use shell_core::Interpreter;
use shell_core::rules::Platform;
use std::io;

#[derive(FromArgs)]
/// A small interactive shell.
struct Args {
    #[argh(option, default = "Platform::native()")]
    /// lookup and quoting rules to use: `posix` or `windows`. Defaults to the host platform.
    platform: Platform,

    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status.
    command: Option<String>,

    #[argh(option, default = "String::from(\"$ \")")]
    /// prompt printed before each line in interactive mode.
    prompt: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut shell = Interpreter::for_platform(args.platform);
    let status = match args.command {
        Some(line) => shell.run_line(&line),
        None => shell.repl(io::stdin().lock(), &mut io::stdout(), &args.prompt)?,
    };
    std::process::exit(status)
}
