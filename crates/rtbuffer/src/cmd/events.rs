use crate::cmd::{connect, EventsArgs};
use crate::exit::{server_error, CliResult, SUCCESS};
use crate::output::{print_events, OutputFormat};

pub fn run(args: EventsArgs, format: OutputFormat) -> CliResult<i32> {
    let (_endpoint, mut client) = connect(&args.connect)?;

    let (first, events) = match (args.begin, args.end) {
        (None, None) => (0, client.get_all_events()),
        (begin, end) => {
            let begin = begin.unwrap_or(0);
            let end = match end {
                Some(end) => end,
                None => client
                    .get_header()
                    .map_err(|err| server_error("read header failed", err))?
                    .event_count,
            };
            (begin, client.get_events(begin, end))
        }
    };
    let events = events.map_err(|err| server_error("read events failed", err))?;

    print_events(first, &events, format);
    Ok(SUCCESS)
}
