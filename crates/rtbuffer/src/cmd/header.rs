use crate::cmd::{connect, ConnectArgs};
use crate::exit::{server_error, CliResult, SUCCESS};
use crate::output::{print_header, OutputFormat};

pub fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let (endpoint, mut client) = connect(&args)?;
    let header = client
        .get_header()
        .map_err(|err| server_error("read header failed", err))?;
    print_header(&header, &endpoint.to_string(), format);
    Ok(SUCCESS)
}
