use lc3serial_image::ImageFormat;

use crate::cmd::InfoArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_image, OutputFormat};

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let image = args.image.load(&args.image_path)?;
    let layout = args
        .image
        .image_format
        .map(ImageFormat::from)
        .unwrap_or_else(|| ImageFormat::detect(&args.image_path));
    print_image(&args.image_path, layout.as_str(), &image, format);
    Ok(SUCCESS)
}
