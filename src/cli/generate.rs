use std::future::Future;
use std::io::{self, IsTerminal, Read, Write};

use thiserror::Error;
use tokio::{select, signal};

use crate::catalog::Role;
use crate::color::{paint, MODEL_PROMPT};
use crate::providers::{self, collect_text, AsyncFragmentIterator, StreamEvent, TextGenerator};
use crate::registry::registry::{ModelRef, Registry};
use crate::utils::errors::INTERRUPTED_EXIT_CODE;
use crate::{die, GenerateArgs};

#[derive(Debug, Error)]
enum RelayError {
    #[error(transparent)]
    Generation(#[from] providers::Error),
    #[error("failed to write the response: {0}")]
    Output(#[from] io::Error),
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Completed,
    Interrupted,
}

/// Copies fragments to `out` as they arrive until the stream ends or `cancel` resolves.
async fn relay<W, C>(
    stream: &mut dyn AsyncFragmentIterator,
    out: &mut W,
    cancel: C,
) -> Result<Outcome, RelayError>
where
    W: Write,
    C: Future<Output = ()>,
{
    tokio::pin!(cancel);

    loop {
        select! {
            biased;

            _ = &mut cancel => return Ok(Outcome::Interrupted),
            event = stream.next() => match event? {
                StreamEvent::Fragment(fragment) => {
                    out.write_all(fragment.text.as_bytes())?;
                    out.flush()?;
                }
                StreamEvent::End => return Ok(Outcome::Completed),
            },
        }
    }
}

async fn ctrl_c() {
    if signal::ctrl_c().await.is_err() {
        // Without a handler, never report an interrupt
        std::future::pending::<()>().await;
    }
}

fn read_prompt(args: &GenerateArgs) -> String {
    if let Some(prompt) = &args.prompt {
        return prompt.clone();
    }

    let mut stdin = io::stdin();

    if stdin.is_terminal() {
        die!("no prompt was given, pass it as an argument or through standard input");
    }

    let mut buf = String::new();

    if let Err(err) = stdin.read_to_string(&mut buf) {
        die!("failed to read the prompt from standard input: {}", err);
    }

    buf
}

fn select_model(registry: &Registry, model: Option<&str>) -> ModelRef {
    match model {
        Some(id) => registry.model(id),
        None => registry.model_for_role(Role::Chat),
    }
}

fn fail(model: &ModelRef, err: &providers::Error) -> ! {
    tracing::debug!(
        model = model.requested(),
        kind = ?err.kind(),
        retryable = err.is_retryable(),
        "generation failed"
    );

    die!("generation with \"{}\" failed: {}", model.requested(), err)
}

async fn generate_once(model: &ModelRef, prompt: &str) {
    match model.generate(prompt).await {
        Ok(result) => println!("{}", result.text),
        Err(err) => fail(model, &err),
    }
}

pub(crate) async fn generate_cmd(registry: &Registry, args: &GenerateArgs) {
    let prompt = read_prompt(args);

    let model = select_model(registry, args.model.as_deref());

    let resolved = model.resolve().await;

    match resolved.handle.infer_url() {
        Ok(endpoint) => tracing::debug!(
            model = model.requested(),
            resolution = %resolved.resolution,
            %endpoint,
            "selected model"
        ),
        Err(err) => fail(&model, &err),
    }

    if args.no_stream {
        generate_once(&model, &prompt).await;
        return;
    }

    let mut stream = match model.stream(&prompt).await {
        Ok(stream) => stream,
        Err(err) => fail(&model, &err),
    };

    // If the output is a terminal (e.g., user-facing), incrementally print it.
    let incremental = io::stdout().is_terminal();

    let outcome = if incremental {
        print!("{} ", paint(*MODEL_PROMPT, &format!("{}>", model.requested())));

        let outcome = relay(stream.as_mut(), &mut io::stdout(), ctrl_c()).await;

        println!();

        outcome
    } else {
        select! {
            text = collect_text(stream.as_mut()) => text
                .map(|text| {
                    print!("{}", text);
                    Outcome::Completed
                })
                .map_err(RelayError::from),
            _ = ctrl_c() => Ok(Outcome::Interrupted),
        }
    };

    tracing::debug!(
        model = model.requested(),
        termination = ?stream.termination(),
        "generation finished"
    );

    match outcome {
        Ok(Outcome::Completed) => {}
        Ok(Outcome::Interrupted) => std::process::exit(INTERRUPTED_EXIT_CODE),
        Err(RelayError::Generation(err)) => fail(&model, &err),
        Err(err) => die!("generation with \"{}\" failed: {}", model.requested(), err),
    }
}
