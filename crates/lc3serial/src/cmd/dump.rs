use std::io::Write;

use crate::cmd::DumpArgs;
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::output::hex_dump;

pub fn run(args: DumpArgs) -> CliResult<i32> {
    let image = args.image.load(&args.image_path)?;
    let mut out = std::io::stdout().lock();
    for line in hex_dump(&image) {
        writeln!(out, "{line}").map_err(|err| io_error("writing dump failed", err))?;
    }
    Ok(SUCCESS)
}
