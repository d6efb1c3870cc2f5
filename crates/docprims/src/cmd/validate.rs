use docprims_schema::SchemaError;

use crate::cmd::{block_on, build_registry, load_schema, read_json, ValidateArgs};
use crate::exit::{schema_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_reports, DocumentReport, OutputFormat};

pub fn run(args: ValidateArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = build_registry(&args.registry)?;
    let schema = load_schema(&args.schema, registry)?;

    let mut documents = Vec::with_capacity(args.documents.len());
    for path in &args.documents {
        documents.push((path.display().to_string(), read_json(path)?));
    }

    let reports = block_on(async {
        schema
            .wait_loaded()
            .await
            .map_err(|err| schema_error(schema.name(), err))?;

        let mut reports = Vec::with_capacity(documents.len());
        for (document, value) in documents {
            let mut report = DocumentReport {
                schema_id: DocumentReport::SCHEMA_ID,
                document,
                schema: schema.name().to_string(),
                valid: true,
                errors: Vec::new(),
                hook_failures: Vec::new(),
            };
            match schema.validate_document(&value).await {
                Ok(()) => {}
                Err(SchemaError::Validation(rejected)) => {
                    report.valid = false;
                    report.errors = rejected.errors;
                    report.hook_failures = rejected.hook_failures;
                }
                Err(err) => return Err(schema_error(&report.document, err)),
            }
            tracing::debug!(document = %report.document, valid = report.valid, "validated document");
            reports.push(report);
        }
        Ok::<_, CliError>(reports)
    })??;

    print_reports(&reports, format);

    if reports.iter().all(|report| report.valid) {
        Ok(SUCCESS)
    } else {
        Ok(DATA_INVALID)
    }
}
