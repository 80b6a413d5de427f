use rtbuffer_server::{BufferServer, ServerConfig, ShutdownHandle};
use tracing::info;

use crate::cmd::{parse_endpoint, ServeArgs};
use crate::exit::{server_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_listening, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = match &args.config {
        Some(path) => ServerConfig::from_json_file(path)
            .map_err(|err| CliError::new(USAGE, err.to_string()))?,
        None => ServerConfig::default(),
    };
    let endpoint = parse_endpoint(&args.listen)?;

    let server = BufferServer::bind(&endpoint, config)
        .map_err(|err| server_error(&format!("bind {endpoint} failed"), err))?;
    install_ctrlc_handler(server.shutdown_handle())?;

    print_listening(&server.endpoint().to_string(), format);
    server
        .serve()
        .map_err(|err| server_error("server failed", err))?;
    info!("shutdown complete");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(handle: ShutdownHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        handle.shutdown();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
