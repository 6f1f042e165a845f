use lc3serial_redirect::program;
use tracing::info;

use crate::cmd::{open_port, ProgramArgs};
use crate::exit::{redirect_error, CliResult, SUCCESS};

pub fn run(args: ProgramArgs) -> CliResult<i32> {
    let image = args.image.load(&args.image_path)?;
    let mut port = open_port(&args.serial)?;

    let written =
        program(&mut port, &image).map_err(|err| redirect_error("programming failed", err))?;
    info!(
        image = %args.image_path.display(),
        bytes = written,
        origin = image.destination_offset(),
        "board programmed"
    );
    Ok(SUCCESS)
}
