use std::{
    fs,
    io::{self, Write},
    process,
};

use texd::{
    application::{AppError, Compilation, RenderService},
    config::{self, Command, RenderArgs, Settings},
    domain::Rename,
    infra::{
        client::{RenderError, ResponseBody, TransferClient},
        error::InfraError,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let logs = error.as_render().and_then(RenderError::logs);
    if dispatcher::has_been_set() {
        error!(error = %error, logs, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, logs, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Status => run_status(&settings).await,
        Command::Render(args) => run_render(&settings, args).await,
    }
}

async fn run_status(settings: &Settings) -> Result<(), AppError> {
    let client = TransferClient::new(&settings.client)?;
    let output = match client.status().await? {
        ResponseBody::Json(value) => serde_json::to_string_pretty(&value)
            .map_err(|err| AppError::unexpected(format!("failed to format status: {err}")))?
            .into_bytes(),
        other => other.into_bytes().to_vec(),
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(&output).map_err(InfraError::from)?;
    writeln!(stdout).map_err(InfraError::from)?;
    Ok(())
}

async fn run_render(settings: &Settings, args: RenderArgs) -> Result<(), AppError> {
    let service = RenderService::from_settings(settings)?;

    let mut attachments = service.attachments();
    for spec in &args.attach {
        let rename = spec.name.clone().map_or(Rename::Keep, Rename::To);
        attachments.attach(&spec.path, rename)?;
    }
    for path in &args.reference {
        attachments.reference(path, Rename::Keep)?;
    }

    let main_input = fs::read(&args.input).map_err(InfraError::from)?;
    let compilation = Compilation::new(attachments, main_input);
    info!(
        input = compilation.main_input_name(),
        attachments = compilation.attachments().len(),
        "Rendering document"
    );

    let Some(pdf) = service.render_compilation(&compilation).await? else {
        return Ok(());
    };

    match args.output {
        Some(path) => {
            fs::write(&path, &pdf).map_err(InfraError::from)?;
            info!(path = %path.display(), bytes = pdf.len(), "Document written");
        }
        None => io::stdout()
            .lock()
            .write_all(&pdf)
            .map_err(InfraError::from)?,
    }
    Ok(())
}
