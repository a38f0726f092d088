use crate::client::{ApiPayload, ClientError, ClientOptions, OpenApiClient, RawRequest, RequestParams};
use crate::docs;
use crate::ids::SourceId;
use crate::proxy::ProxyServer;
use crate::runtime_config::RuntimeConfig;
use crate::sources::{JsonFilePersistence, LoadStatus, SpecWorkspace};
use crate::spec::{
    collect_operations, document_servers, find_operation, operation_by_id,
    resolve_security_requirements, schema_example, HttpMethod, Operation, RawSpec, SpecLoader,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Command-line interface for specdeck
///
/// Browse an OpenAPI document, synthesize examples, call operations against
/// the live API and run the pass-through proxy.
#[derive(Debug, Parser)]
#[command(name = "specdeck", version)]
#[command(about = "OpenAPI 3.x explorer and request client", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Where to read the document from.
#[derive(Debug, Clone, Default, Args)]
pub struct SpecArgs {
    /// File path or http(s) URL; defaults to the active source
    #[arg(short, long)]
    pub spec: Option<String>,

    /// Fetch the document through the configured proxy endpoint
    #[arg(long, default_value_t = false)]
    pub via_proxy: bool,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Summarize the document: info, servers and every operation
    Inspect {
        #[command(flatten)]
        spec: SpecArgs,

        /// Print the operation table as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List operations grouped by tag
    Tags {
        #[command(flatten)]
        spec: SpecArgs,
    },
    /// Print one resolved operation as JSON
    ///
    /// The operation is selected by operationId or as `"METHOD /path"`.
    Show {
        #[command(flatten)]
        spec: SpecArgs,

        /// operationId or "METHOD /path"
        operation: String,
    },
    /// Print a synthesized example
    Example {
        #[command(flatten)]
        spec: SpecArgs,

        /// Component schema name under #/components/schemas
        #[arg(long, conflicts_with = "operation", required_unless_present = "operation")]
        schema: Option<String>,

        /// Request body example for this operation (operationId or "METHOD /path")
        #[arg(long)]
        operation: Option<String>,

        /// With --operation: the response status to show instead of the request body
        #[arg(long, requires = "operation")]
        response: Option<String>,
    },
    /// Execute an operation against the live API
    ///
    /// Selectors that match no operation but read `"METHOD /path"` are sent
    /// as raw requests relative to the base URL.
    Call {
        #[command(flatten)]
        spec: SpecArgs,

        /// operationId or "METHOD /path"
        operation: String,

        /// Path parameter, repeatable
        #[arg(short, long = "path", value_name = "NAME=VALUE", value_parser = parse_key_value)]
        path_params: Vec<(String, String)>,

        /// Query parameter, repeatable; repeated names become arrays
        #[arg(short, long, value_name = "NAME=VALUE", value_parser = parse_key_value)]
        query: Vec<(String, String)>,

        /// Header, repeatable
        #[arg(short = 'H', long = "header", value_name = "NAME=VALUE", value_parser = parse_key_value)]
        headers: Vec<(String, String)>,

        /// JSON body, or @file to read it from a file
        #[arg(short, long)]
        body: Option<String>,

        /// Override the base URL derived from the document servers
        #[arg(long)]
        base_url: Option<String>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run the pass-through proxy
    Proxy {
        /// Address to bind (defaults to SPECDECK_PROXY_ADDR)
        #[arg(long)]
        addr: Option<String>,

        /// Endpoint path (defaults to SPECDECK_PROXY_PATH)
        #[arg(long)]
        path: Option<String>,

        /// Worker threads (defaults to SPECDECK_PROXY_WORKERS)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Manage the saved spec sources
    Sources {
        #[command(subcommand)]
        command: SourcesCommand,
    },
}

/// Source registry commands
#[derive(Debug, Subcommand)]
pub enum SourcesCommand {
    /// List sources, marking the active one
    List,
    /// Load a document and save it as the active source
    Add {
        /// File path or http(s) URL
        url: String,

        /// Name used when the document has no title
        #[arg(short, long, default_value = "")]
        name: String,

        /// Fetch through the proxy endpoint
        #[arg(long, default_value_t = false)]
        proxy: bool,
    },
    /// Remove a source
    Remove { id: String },
    /// Make a source active
    Use { id: String },
    /// Turn proxy use on or off for a source
    Proxy {
        id: String,

        /// Disable instead of enable
        #[arg(long, default_value_t = false)]
        off: bool,
    },
}

/// Parse `NAME=VALUE`.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

/// Fold repeated names into arrays, keeping first-seen order.
fn collect_pairs(pairs: &[(String, String)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (name, value) in pairs {
        let value = Value::String(value.clone());
        match map.get_mut(name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(name.clone(), value);
            }
        }
    }
    map
}

fn parse_body(raw: &str) -> Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read body file {path}"))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("Body is not valid JSON")
}

/// Find an operation by operationId, then by `"METHOD /path"`.
pub fn select_operation<'a>(operations: &'a [Operation], selector: &str) -> Option<&'a Operation> {
    operation_by_id(operations, selector).or_else(|| {
        let (method, path) = split_selector(selector)?;
        find_operation(operations, path, method)
    })
}

fn split_selector(selector: &str) -> Option<(HttpMethod, &str)> {
    let (method, path) = selector.trim().split_once(char::is_whitespace)?;
    Some((HttpMethod::parse(method)?, path.trim()))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn loader(config: &RuntimeConfig) -> SpecLoader {
    SpecLoader::default().with_proxy(config.proxy_endpoint())
}

fn workspace(config: &RuntimeConfig) -> SpecWorkspace {
    SpecWorkspace::new(
        config.default_spec_location.clone(),
        loader(config),
        Arc::new(JsonFilePersistence::new(&config.sources_file)),
    )
}

/// Load the requested document, or the active source's.
///
/// Returns the document and the URL it came from when remote.
async fn load_document(config: &RuntimeConfig, args: &SpecArgs) -> Result<(RawSpec, Option<String>)> {
    if let Some(location) = &args.spec {
        let spec = loader(config).load(location, args.via_proxy).await?;
        let spec_url = crate::spec::is_remote(location).then(|| location.clone());
        return Ok((spec, spec_url));
    }
    let workspace = workspace(config);
    match workspace.init().await? {
        LoadStatus::Ready => {}
        LoadStatus::Error(message) => bail!("{message}"),
        LoadStatus::Idle | LoadStatus::Loading => bail!("No active spec source"),
    }
    let loaded = workspace
        .current()
        .ok_or_else(|| anyhow!("No spec loaded"))?;
    Ok((loaded.spec.clone(), loaded.spec_url().map(String::from)))
}

/// Parse the command line and run it.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded, a selector matches
/// nothing, a call fails or the proxy cannot bind.
pub fn run_cli() -> Result<()> {
    run(Cli::parse(), RuntimeConfig::from_env())
}

/// Run a parsed command with the given configuration.
pub fn run(cli: Cli, config: RuntimeConfig) -> Result<()> {
    match cli.command {
        Commands::Proxy {
            addr,
            path,
            workers,
        } => run_proxy(&config, addr, path, workers),
        command => runtime()?.block_on(run_async(command, config)),
    }
}

async fn run_async(command: Commands, config: RuntimeConfig) -> Result<()> {
    match command {
        Commands::Inspect { spec, json } => {
            let (spec, _) = load_document(&config, &spec).await?;
            let operations = collect_operations(&spec);
            if json {
                return print_json(&operations);
            }
            let info = docs::api_info(&spec);
            println!("{} {} (OpenAPI {})", info.title, info.version, info.openapi);
            if !info.description.is_empty() {
                println!("{}", info.description);
            }
            for server in document_servers(&spec) {
                println!("server: {}", server.url);
            }
            println!();
            for op in &operations {
                println!(
                    "{:<7} {:<40} {:<30} {}",
                    op.method.as_upper(),
                    op.path,
                    op.operation_id,
                    op.summary
                );
            }
            Ok(())
        }
        Commands::Tags { spec } => {
            let (spec, _) = load_document(&config, &spec).await?;
            let operations = collect_operations(&spec);
            for group in docs::operations_by_tag(&operations, &spec) {
                match &group.tag.description {
                    Some(description) => println!("{} - {}", group.tag.name, description),
                    None => println!("{}", group.tag.name),
                }
                for op in &group.operations {
                    println!("  {:<7} {} ({})", op.method.as_upper(), op.path, op.operation_id);
                }
            }
            Ok(())
        }
        Commands::Show { spec, operation } => {
            let (spec, _) = load_document(&config, &spec).await?;
            let operations = collect_operations(&spec);
            let op = select_operation(&operations, &operation)
                .ok_or_else(|| anyhow!("Unknown operation '{operation}'"))?;
            let mut rendered = serde_json::to_value(op)?;
            if let Value::Object(fields) = &mut rendered {
                fields.insert(
                    "security".to_string(),
                    serde_json::to_value(resolve_security_requirements(&spec, op))?,
                );
            }
            print_json(&rendered)
        }
        Commands::Example {
            spec,
            schema,
            operation,
            response,
        } => {
            let (spec, _) = load_document(&config, &spec).await?;
            if let Some(name) = schema {
                let (_, resolved) = docs::schemas(&spec)
                    .into_iter()
                    .find(|(n, _)| *n == name)
                    .ok_or_else(|| anyhow!("Unknown schema '{name}'"))?;
                return print_json(&schema_example(&resolved));
            }
            let selector = operation.unwrap_or_default();
            let operations = collect_operations(&spec);
            let op = select_operation(&operations, &selector)
                .ok_or_else(|| anyhow!("Unknown operation '{selector}'"))?;
            let content = match &response {
                Some(status) => op
                    .response(status)
                    .ok_or_else(|| anyhow!("No response '{status}' on {}", op.operation_id))?
                    .json_content(),
                None => op.request_body.as_ref().and_then(|b| b.json_content()),
            };
            let content = content.ok_or_else(|| anyhow!("No JSON content to exemplify"))?;
            let example = content
                .examples
                .first()
                .map(|e| e.value.clone())
                .or_else(|| content.schema.as_ref().map(schema_example))
                .unwrap_or(Value::Null);
            print_json(&example)
        }
        Commands::Call {
            spec,
            operation,
            path_params,
            query,
            headers,
            body,
            base_url,
            timeout,
        } => {
            let (spec, spec_url) = load_document(&config, &spec).await?;
            let mut options = ClientOptions::default();
            if let Some(url) = base_url {
                options = options.base_url(url);
            }
            if let Some(url) = spec_url {
                options = options.spec_url(url);
            }
            if let Some(timeout) = timeout.map(Duration::from_secs).or(config.request_timeout) {
                options = options.timeout(timeout);
            }
            let client = OpenApiClient::new(&spec, options)?;

            let params = RequestParams {
                path_params: collect_pairs(&path_params),
                query: collect_pairs(&query),
                body: body.as_deref().map(parse_body).transpose()?,
                headers: headers.into_iter().collect(),
            };
            let result = match client.operation(&operation) {
                Some(_) => client.call(&operation, params).await,
                None => match select_operation(client.operations(), &operation) {
                    Some(op) => client.execute(op, params).await,
                    None => {
                        let (method, path) = split_selector(&operation)
                            .ok_or_else(|| anyhow!("Unknown operation '{operation}'"))?;
                        client
                            .request(RawRequest::new(method, path).with_params(params))
                            .await
                    }
                },
            };
            match result {
                Ok(response) => {
                    eprintln!("HTTP {}", response.status);
                    print_payload(&response.payload)
                }
                Err(ClientError::Status { status, payload }) => {
                    eprintln!("HTTP {status}");
                    print_payload(&payload)?;
                    bail!("request failed with status {status}")
                }
                Err(err) => Err(err.into()),
            }
        }
        Commands::Sources { command } => run_sources(command, &config).await,
        Commands::Proxy { .. } => bail!("the proxy runs outside the async runtime"),
    }
}

fn print_payload(payload: &ApiPayload) -> Result<()> {
    match payload {
        ApiPayload::Json(value) => print_json(value),
        ApiPayload::Text(text) => {
            println!("{text}");
            Ok(())
        }
    }
}

async fn run_sources(command: SourcesCommand, config: &RuntimeConfig) -> Result<()> {
    let workspace = workspace(config);
    match command {
        SourcesCommand::List => {
            // A failed load still lists the sources.
            let status = workspace.init().await?;
            let active = workspace.active_source().map(|s| s.id);
            for source in workspace.sources() {
                let marker = if Some(&source.id) == active.as_ref() { "*" } else { " " };
                let proxy = if source.use_proxy { " [proxy]" } else { "" };
                println!("{marker} {:<28} {}  {}{proxy}", source.id, source.name, source.url);
            }
            if let LoadStatus::Error(message) = status {
                eprintln!("active source failed to load: {message}");
            }
            Ok(())
        }
        SourcesCommand::Add { url, name, proxy } => {
            workspace.init().await?;
            let source = workspace.add_source(&name, &url, proxy).await?;
            info!(id = %source.id, "source saved");
            println!("{}", source.id);
            Ok(())
        }
        SourcesCommand::Remove { id } => {
            workspace.init().await?;
            let id = SourceId::from(id.as_str());
            if !workspace.remove_source(&id).await? {
                bail!("Unknown source '{id}'");
            }
            Ok(())
        }
        SourcesCommand::Use { id } => {
            workspace.init().await?;
            match workspace.set_active(&SourceId::from(id.as_str())).await? {
                LoadStatus::Error(message) => bail!("{message}"),
                _ => Ok(()),
            }
        }
        SourcesCommand::Proxy { id, off } => {
            workspace.init().await?;
            let id = SourceId::from(id.as_str());
            if workspace.sources().iter().all(|s| s.id != id) {
                bail!("Unknown source '{id}'");
            }
            workspace.set_source_proxy(&id, !off)?;
            Ok(())
        }
    }
}

fn run_proxy(
    config: &RuntimeConfig,
    addr: Option<String>,
    path: Option<String>,
    workers: Option<usize>,
) -> Result<()> {
    let addr = addr.unwrap_or_else(|| config.proxy_addr.clone());
    let server = ProxyServer::new(
        path.unwrap_or_else(|| config.proxy_path.clone()),
        workers.unwrap_or(config.proxy_workers),
    );
    let handle = server
        .start(addr.as_str())
        .with_context(|| format!("Failed to bind proxy on {addr}"))?;
    handle.wait_ready()?;
    println!("proxy listening on http://{}", handle.addr());
    wait_for_shutdown()?;
    handle.stop();
    Ok(())
}

#[cfg(unix)]
fn wait_for_shutdown() -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "shutting down proxy");
    }
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown() -> Result<()> {
    loop {
        std::thread::park();
    }
}
