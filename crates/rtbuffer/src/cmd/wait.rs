use std::time::Instant;

use rtbuffer_core::{WaitOutcome, WaitThreshold};

use crate::cmd::{connect, parse_duration, WaitArgs};
use crate::exit::{server_error, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_wait, OutputFormat};

pub fn run(args: WaitArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let (_endpoint, mut client) = connect(&args.connect)?;

    let started = Instant::now();
    let reply = client
        .wait_data(WaitThreshold::new(args.samples, args.events), timeout)
        .map_err(|err| server_error("wait failed", err))?;
    print_wait(&reply, started.elapsed().as_secs_f64() * 1000.0, format);

    Ok(match reply.outcome {
        WaitOutcome::Satisfied => SUCCESS,
        WaitOutcome::Timeout => TIMEOUT,
        WaitOutcome::GenerationChanged | WaitOutcome::Cancelled => FAILURE,
    })
}
