use docprims_schema::ValidatorRegistry;

use crate::cmd::FormatsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_validators, OutputFormat, ValidatorListing};

pub fn run(_args: FormatsArgs, format: OutputFormat) -> CliResult<i32> {
    let validators = ValidatorRegistry::new();
    let listing = ValidatorListing {
        schema_id: ValidatorListing::SCHEMA_ID,
        formats: validators.format_names(),
        types: validators.type_names(),
    };
    print_validators(&listing, format);
    Ok(SUCCESS)
}
