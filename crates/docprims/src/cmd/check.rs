use crate::cmd::{block_on, build_registry, load_schema, CheckArgs};
use crate::exit::{schema_error, CliResult, SUCCESS};
use crate::output::{print_check, CheckReport, OutputFormat};

pub fn run(args: CheckArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = build_registry(&args.registry)?;
    let schema = load_schema(&args.schema, registry)?;

    block_on(schema.wait_loaded())?.map_err(|err| schema_error(schema.name(), err))?;

    let report = CheckReport {
        schema_id: CheckReport::SCHEMA_ID,
        schema: schema.name().to_string(),
        file: args.schema.display().to_string(),
        loaded: schema.loaded(),
        registered: schema.registry().names(),
    };
    print_check(&report, format);

    Ok(SUCCESS)
}
