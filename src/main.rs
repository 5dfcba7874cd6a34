//! Command-line entry point for the MagicQuill client

use anyhow::{anyhow, bail, Context};
use magic_quill_client::{
    backend::traits::{FrontendImages, GenerateRequest, PromptGuessRequest},
    checklist::{CheckStatus, Checklist},
    config::Settings,
    load::{LoadRunner, LoadTarget},
    output::OutputStore,
    DataUri, HttpBackend, QuillBackend,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: quill [--config <path>] [--json] <command> [args]

Commands:
  guess-prompt <original> [--color <img>] [--edge <img>]
  background <image> [--out <dir>]
  generate --prompt <text> --original <img> --mask <img> --add-edge <img>
           --remove-edge <img> [--color <img>] [--seed <n>] [--out <dir>]
  checklist
  load <guess-prompt|background> <image> [--requests <n>]
  health";

/// Flags that take a value
const VALUE_FLAGS: &[&str] = &[
    "--config",
    "--color",
    "--edge",
    "--out",
    "--prompt",
    "--original",
    "--mask",
    "--add-edge",
    "--remove-edge",
    "--seed",
    "--requests",
];

struct CliArgs {
    args: Vec<String>,
    positional: Vec<String>,
}

impl CliArgs {
    fn parse(args: Vec<String>) -> Self {
        let mut positional = Vec::new();
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            if VALUE_FLAGS.contains(&arg.as_str()) {
                iter.next();
            } else if !arg.starts_with("--") {
                positional.push(arg.clone());
            }
        }
        Self { args, positional }
    }

    fn value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|pos| self.args.get(pos + 1))
            .map(String::as_str)
    }

    fn required(&self, flag: &str) -> anyhow::Result<&str> {
        self.value(flag)
            .ok_or_else(|| anyhow!("missing required {}\n\n{}", flag, USAGE))
    }

    fn has(&self, flag: &str) -> bool {
        self.args.iter().any(|arg| arg == flag)
    }

    fn positional(&self, index: usize, what: &str) -> anyhow::Result<&str> {
        self.positional
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("missing {}\n\n{}", what, USAGE))
    }
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn load_image(path: &str) -> anyhow::Result<DataUri> {
    DataUri::from_file(path)
        .await
        .with_context(|| format!("reading image {}", path))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = CliArgs::parse(std::env::args().collect());
    if cli.has("--help") || cli.positional.is_empty() {
        println!("{}", USAGE);
        return Ok(());
    }

    let settings = match cli.value("--config") {
        Some(path) => Settings::load_required(path)?,
        None => Settings::load()?,
    };
    settings.validate()?;
    init_logging(&settings);

    info!(
        backend = %settings.backend.name,
        url = %settings.backend.base_url,
        "Loaded configuration"
    );

    let backend: Arc<dyn QuillBackend> = Arc::new(HttpBackend::new(&settings.backend)?);
    let json = cli.has("--json");
    let output_dir = cli.value("--out").unwrap_or(&settings.output.dir).to_string();

    match cli.positional(0, "command")? {
        "guess-prompt" => {
            let mut request = PromptGuessRequest::new(load_image(cli.positional(1, "original image")?).await?);
            if let Some(path) = cli.value("--color") {
                request = request.with_color_image(load_image(path).await?);
            }
            if let Some(path) = cli.value("--edge") {
                request = request.with_edge_image(load_image(path).await?);
            }

            let prompt = backend.guess_prompt(request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&prompt.phrases())?);
            } else {
                println!("{}", prompt);
            }
        }
        "background" => {
            let image = load_image(cli.positional(1, "image")?).await?;
            let resized = backend.process_background_img(image).await?;
            let dims = resized.dimensions()?;
            let path = OutputStore::new(&output_dir)
                .save_with_prefix("background", &resized)
                .await?;
            println!("{} ({})", path.display(), dims);
        }
        "generate" => {
            let original = load_image(cli.required("--original")?).await?;
            let color = match cli.value("--color") {
                Some(path) => load_image(path).await?,
                None => original.clone(),
            };
            let images = FrontendImages {
                total_mask: load_image(cli.required("--mask")?).await?,
                original_image: original,
                add_color_image: color,
                add_edge_image: load_image(cli.required("--add-edge")?).await?,
                remove_edge_image: load_image(cli.required("--remove-edge")?).await?,
            };

            let mut params = settings.generation.clone();
            if let Some(seed) = cli.value("--seed") {
                params.seed = seed
                    .parse()
                    .with_context(|| format!("invalid --seed '{}'", seed))?;
            }

            let request = GenerateRequest::new(images, cli.required("--prompt")?, params);
            let response = backend.generate(request).await?;
            let path = OutputStore::new(&output_dir)
                .save_with_prefix("generated", &response.generated_image)
                .await?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "path": path,
                        "seed": response.seed,
                        "metadata": response.metadata,
                    }))?
                );
            } else {
                println!("{} (seed {})", path.display(), response.seed);
            }
        }
        "checklist" => {
            let checklist = Checklist::new(
                backend.clone(),
                settings.checklist.clone(),
                settings.generation.clone(),
            );
            let report = checklist.run().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for outcome in &report.outcomes {
                    let mark = match outcome.status {
                        CheckStatus::Passed => "PASS",
                        CheckStatus::Failed => "FAIL",
                        CheckStatus::Skipped => "SKIP",
                    };
                    println!(
                        "[{}] {:<36} {:>6} ms  {}",
                        mark, outcome.name, outcome.elapsed_ms, outcome.detail
                    );
                }
                println!(
                    "\n{} passed, {} failed, {} skipped",
                    report.passed(),
                    report.failed(),
                    report.skipped()
                );
            }

            if !report.is_success() {
                std::process::exit(1);
            }
        }
        "load" => {
            let image = load_image(cli.positional(2, "image")?).await?;
            let target = match cli.positional(1, "load target")? {
                "guess-prompt" => LoadTarget::GuessPrompt(PromptGuessRequest::new(image)),
                "background" => LoadTarget::Background(image),
                other => bail!("unknown load target '{}'\n\n{}", other, USAGE),
            };

            let mut config = settings.load.clone();
            if let Some(requests) = cli.value("--requests") {
                config.requests = requests
                    .parse()
                    .with_context(|| format!("invalid --requests '{}'", requests))?;
            }

            let stats = LoadRunner::new(backend.clone(), config).run(target).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!(
                    "{}: {}/{} succeeded, {} failed, {} timed out in {} ms",
                    stats.target, stats.succeeded, stats.total, stats.failed, stats.timed_out, stats.wall_ms
                );
                if let Some(latency) = stats.latency {
                    println!(
                        "latency ms: min {} / mean {} / p95 {} / max {}",
                        latency.min_ms, latency.mean_ms, latency.p95_ms, latency.max_ms
                    );
                }
            }
        }
        "health" => {
            if backend.health_check().await {
                println!("{} is reachable at {}", backend.name(), backend.base_url());
            } else {
                println!("{} is not reachable at {}", backend.name(), backend.base_url());
                std::process::exit(1);
            }
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }

    Ok(())
}
