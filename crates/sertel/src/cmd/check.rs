use crate::cmd::{load_config, CheckArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_config_summary, OutputFormat};

pub fn run(args: CheckArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args.config)?;
    print_config_summary(&config, format);
    Ok(SUCCESS)
}
