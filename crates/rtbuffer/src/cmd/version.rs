use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("rtbuffer {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: rtbuffer");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("protocol_version: {}", rtbuffer_frame::VERSION);
    println!("default_port: {}", rtbuffer_transport::DEFAULT_PORT);
    println!(
        "build_target: {}",
        option_env!("RTBUFFER_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "transports: tcp{}",
        if cfg!(unix) { ", unix-domain-socket" } else { "" }
    );

    Ok(SUCCESS)
}
