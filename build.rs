#[macro_use]
extern crate clap;

use clap::Shell;
use std::{env, path::PathBuf};

#[path = "src/cli.rs"]
mod cli;

fn main() {
    let mut out_dir = match env::var_os("OUT_DIR") {
        Some(out_dir) => PathBuf::from(out_dir),
        None => return,
    };
    // Completions go next to the binary, not in the build script folder.
    let _ = out_dir.pop();
    let _ = out_dir.pop();
    let _ = out_dir.pop();

    let mut cli = cli::generate();
    cli.gen_completions("apk-leak-analyzer", Shell::Bash, &out_dir);
    cli.gen_completions("apk-leak-analyzer", Shell::Fish, &out_dir);
    cli.gen_completions("apk-leak-analyzer", Shell::Zsh, out_dir);
}
