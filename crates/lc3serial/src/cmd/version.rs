use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("lc3serial {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: lc3serial");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("LC3SERIAL_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("LC3SERIAL_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("host_byte_order: {}", lc3serial_image::ByteOrder::native());
    println!(
        "defaults: port={} baud={} byte_order={}",
        crate::cmd::DEFAULT_PORT,
        lc3serial_transport::DEFAULT_BAUD_RATE,
        lc3serial_image::DEVICE_BYTE_ORDER
    );

    Ok(SUCCESS)
}
