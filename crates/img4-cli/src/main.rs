//! Command-line interface for the img4 toolkit.
//!
//! Inspects, unpacks, builds and verifies IMG4, IM4P, IM4M and IM4R files.

use clap::{ArgAction, Parser, Subcommand};
use img4::container::{self, FourCc};
use img4::der::DerElement;
use img4::manifest;
use img4::payload::{self, Compression, PayloadExtractor};
use img4::ContainerKind;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "img4")]
#[command(about = "Apple IMG4 container tool")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the container kind and what it holds
    Info {
        /// IMG4, IM4P, IM4M or IM4R file
        input: PathBuf,
    },

    /// Extract the payload and/or sub-containers
    Extract {
        /// IMG4 or IM4P file
        input: PathBuf,

        /// Write the payload here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// AES IV (hex)
        #[arg(long, requires = "key")]
        iv: Option<String>,

        /// AES key (hex)
        #[arg(long, requires = "iv")]
        key: Option<String>,

        /// Keep the payload compressed
        #[arg(long)]
        raw: bool,

        /// Write the hypervisor IM4P or companion data found after the payload
        #[arg(long)]
        extra: Option<PathBuf>,

        /// Write the IM4P of an IMG4 here
        #[arg(long)]
        im4p: Option<PathBuf>,

        /// Write the IM4M of an IMG4 here
        #[arg(long)]
        im4m: Option<PathBuf>,

        /// Write the IM4R of an IMG4 here
        #[arg(long)]
        im4r: Option<PathBuf>,
    },

    /// Assemble an IMG4
    Create {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// IM4P file to include
        #[arg(long)]
        im4p: Option<PathBuf>,

        /// IM4M file to include
        #[arg(long)]
        im4m: Option<PathBuf>,

        /// Nonce generator for the IM4R (hex)
        #[arg(short, long)]
        generator: Option<String>,
    },

    /// Wrap raw bytes into an IM4P
    Wrap {
        /// Raw payload file
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Four-character type code, e.g. krnl
        #[arg(short = 't', long = "type")]
        im4p_type: String,

        /// Description string
        #[arg(short, long, default_value = "")]
        desc: String,

        /// Compress with complzss or bvx2
        #[arg(short, long)]
        compression: Option<Compression>,

        /// Data to place after the compressed payload
        #[arg(long, requires = "compression")]
        companion: Option<PathBuf>,
    },

    /// Check a manifest's signature, digests and nonce binding
    Verify {
        /// IM4M or IMG4 file
        input: PathBuf,

        /// IM4P whose digest must be in the manifest
        #[arg(long)]
        im4p: Option<PathBuf>,

        /// Nonce generator to check against BNCH (hex)
        #[arg(short, long)]
        generator: Option<String>,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Info { input } => {
            for line in describe(&load(&input)?)? {
                println!("{line}");
            }
        }
        Command::Extract {
            input,
            output,
            iv,
            key,
            raw,
            extra,
            im4p,
            im4m,
            im4r,
        } => {
            let options = ExtractOptions {
                output,
                keys: iv.zip(key),
                raw,
                extra,
                im4p,
                im4m,
                im4r,
            };
            extract(&input, &options)?;
        }
        Command::Create {
            output,
            im4p,
            im4m,
            generator,
        } => {
            create(&output, im4p.as_deref(), im4m.as_deref(), generator.as_deref())?;
            println!("Created: {}", output.display());
        }
        Command::Wrap {
            input,
            output,
            im4p_type,
            desc,
            compression,
            companion,
        } => {
            let im4p_type: FourCc = im4p_type.parse()?;
            wrap(&input, &output, im4p_type, &desc, compression, companion.as_deref())?;
            println!("Wrote: {}", output.display());
        }
        Command::Verify {
            input,
            im4p,
            generator,
        } => {
            let report = verify(&input, im4p.as_deref(), generator.as_deref())?;
            for line in report.lines() {
                println!("{line}");
            }
            if !report.passed() {
                return Err("verification failed".into());
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read and parse a DER file, tolerating padding after the element.
fn load(path: &Path) -> CliResult<DerElement> {
    let data = fs::read(path)?;
    let (element, consumed) = DerElement::parse_prefix(&data)?;
    if consumed != data.len() {
        tracing::warn!(
            path = %path.display(),
            trailing = data.len() - consumed,
            "ignoring bytes after DER element"
        );
    }
    Ok(element)
}

fn write(path: &Path, data: &[u8]) -> CliResult<()> {
    fs::write(path, data)?;
    tracing::info!(path = %path.display(), len = data.len(), "wrote file");
    Ok(())
}

/// The IM4P held by `element`, which may be an IMG4 or an IM4P.
fn im4p_of(element: &DerElement) -> CliResult<DerElement> {
    if container::is_im4p(element) {
        Ok(element.clone())
    } else {
        Ok(container::get_im4p_from_img4(element)?)
    }
}

/// Human-readable summary lines.
fn describe(element: &DerElement) -> CliResult<Vec<String>> {
    let kind = ContainerKind::of(element).ok_or("not an IMG4 family container")?;
    let mut lines = vec![kind.to_string()];

    match kind {
        ContainerKind::Img4 => {
            for sub in container::summarize(element)? {
                let child = match sub {
                    ContainerKind::Im4p => container::get_im4p_from_img4(element)?,
                    ContainerKind::Im4m => container::get_im4m_from_img4(element)?,
                    _ => container::get_im4r_from_img4(element)?,
                };
                lines.extend(describe(&child)?.into_iter().map(|line| format!("  {line}")));
            }
        }
        ContainerKind::Im4p => {
            lines.push(format!("type: {}", container::get_type_from_im4p(element)?));
            lines.push(format!("desc: {}", container::get_desc_from_im4p(element)?));
            let stored = PayloadExtractor::new(element).decompress(false).extract();
            match stored {
                Ok(stored) => {
                    let scheme = Compression::detect(&stored.data)
                        .map_or("none", Compression::name);
                    lines.push(format!("payload: {} bytes, compression {scheme}", stored.data.len()));
                }
                Err(img4::Error::NotFound(_)) => lines.push("payload: none".into()),
                Err(e) => return Err(e.into()),
            }
            for (n, bag) in payload::keybags(element)?.iter().enumerate() {
                lines.push(format!("kbag {n} (kind {}): {}", bag.kind, bag.to_hex()));
            }
        }
        ContainerKind::Im4m => {
            lines.push(format!("version: {}", manifest::manifest_version(element)?));
            lines.push(format!(
                "certificates: {}",
                manifest::certificate_chain(element)?.len()
            ));
            for (name, properties) in manifest::manifest_objects(element)? {
                let digest = match container::property::find_property(properties, FourCc::DGST)? {
                    Some(digest) => hex::encode(digest.payload()?),
                    None => "-".into(),
                };
                lines.push(format!("{name}: {digest}"));
            }
        }
        ContainerKind::Im4r => {
            lines.push(format!(
                "generator: {:#018x}",
                container::generator_from_im4r(element)?
            ));
        }
        ContainerKind::Im4c => {}
    }

    Ok(lines)
}

struct ExtractOptions {
    output: Option<PathBuf>,
    keys: Option<(String, String)>,
    raw: bool,
    extra: Option<PathBuf>,
    im4p: Option<PathBuf>,
    im4m: Option<PathBuf>,
    im4r: Option<PathBuf>,
}

fn extract(input: &Path, options: &ExtractOptions) -> CliResult<()> {
    let element = load(input)?;

    let subs = [
        (&options.im4p, ContainerKind::Im4p),
        (&options.im4m, ContainerKind::Im4m),
        (&options.im4r, ContainerKind::Im4r),
    ];
    for (path, kind) in subs {
        let Some(path) = path else { continue };
        let sub = match kind {
            ContainerKind::Im4p => im4p_of(&element)?,
            ContainerKind::Im4m => container::get_im4m_from_img4(&element)?,
            _ => container::get_im4r_from_img4(&element)?,
        };
        write(path, &sub.encode())?;
    }

    let Some(output) = &options.output else {
        if subs.iter().all(|(path, _)| path.is_none()) {
            return Err("nothing to extract: pass --output or a sub-container path".into());
        }
        return Ok(());
    };

    let im4p = im4p_of(&element)?;
    let mut extractor = PayloadExtractor::new(&im4p).decompress(!options.raw);
    if let Some((iv, key)) = &options.keys {
        extractor = extractor.decrypt_with(iv.as_str(), key.as_str());
    }
    let extracted = extractor.extract()?;
    if let Some(scheme) = extracted.compression {
        tracing::info!(%scheme, "decompressed payload");
    }
    write(output, &extracted.data)?;

    let extra = extracted
        .hypervisor
        .map(|hypervisor| hypervisor.encode())
        .or(extracted.companion);
    match (extra, &options.extra) {
        (Some(bytes), Some(path)) => write(path, &bytes)?,
        (Some(bytes), None) => tracing::warn!(
            len = bytes.len(),
            "payload is followed by extra data; pass --extra to save it"
        ),
        (None, _) => {}
    }
    Ok(())
}

fn create(
    output: &Path,
    im4p: Option<&Path>,
    im4m: Option<&Path>,
    generator: Option<&str>,
) -> CliResult<()> {
    let mut img4 = container::get_empty_img4_container();
    if let Some(path) = im4p {
        img4 = container::append_im4p_to_img4(&img4, &im4p_of(&load(path)?)?)?;
    }
    if let Some(path) = im4m {
        img4 = container::append_im4m_to_img4(&img4, &load(path)?)?;
    }
    if let Some(generator) = generator {
        let im4r = container::get_im4r_from_generator(manifest::parse_generator(generator)?);
        img4 = container::append_im4r_to_img4(&img4, &im4r)?;
    }
    write(output, &img4.encode())
}

fn wrap(
    input: &Path,
    output: &Path,
    im4p_type: FourCc,
    desc: &str,
    compression: Option<Compression>,
    companion: Option<&Path>,
) -> CliResult<()> {
    let data = fs::read(input)?;
    let companion = companion.map(fs::read).transpose()?;
    let empty = container::get_empty_im4p_container(im4p_type, desc);
    let im4p = payload::append_payload_to_im4p(&empty, &data, compression, companion.as_deref())?;
    write(output, &im4p.encode())
}

/// Outcome of each check `verify` ran. `None` means not checked.
#[derive(Debug, Default)]
struct VerifyReport {
    signature: bool,
    digest: Option<Option<FourCc>>,
    generator: Option<bool>,
}

impl VerifyReport {
    fn passed(&self) -> bool {
        self.signature
            && !matches!(self.digest, Some(None))
            && self.generator != Some(false)
    }

    fn lines(&self) -> Vec<String> {
        let verdict = |ok: bool| if ok { "valid" } else { "INVALID" };
        let mut lines = vec![format!("signature: {}", verdict(self.signature))];
        match self.digest {
            Some(Some(name)) => lines.push(format!("digest: matches {name}")),
            Some(None) => lines.push("digest: NOT IN MANIFEST".into()),
            None => {}
        }
        if let Some(ok) = self.generator {
            lines.push(format!("generator: {}", verdict(ok)));
        }
        lines
    }
}

fn verify(input: &Path, im4p: Option<&Path>, generator: Option<&str>) -> CliResult<VerifyReport> {
    let element = load(input)?;
    let (im4m, embedded_im4p, embedded_generator) = if container::is_img4(&element) {
        let im4p = container::get_im4p_from_img4(&element).ok();
        let generator = container::get_im4r_from_img4(&element)
            .ok()
            .map(|im4r| container::generator_from_im4r(&im4r))
            .transpose()?;
        (container::get_im4m_from_img4(&element)?, im4p, generator)
    } else {
        (element, None, None)
    };

    let mut report = VerifyReport {
        signature: manifest::is_im4m_signature_valid(&im4m)?,
        ..Default::default()
    };

    let im4p = match im4p {
        Some(path) => Some(im4p_of(&load(path)?)?),
        None => embedded_im4p,
    };
    if let Some(im4p) = im4p {
        let mut matched = None;
        for hash in [manifest::get_im4p_sha384(&im4p)?, manifest::get_im4p_sha1(&im4p)?] {
            match manifest::dgst_name_for_hash(&im4m, &hash) {
                Ok(name) => {
                    matched = Some(name);
                    break;
                }
                Err(img4::Error::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        report.digest = Some(matched);
    }

    let generator = match generator {
        Some(value) => Some(manifest::parse_generator(value)?),
        None => embedded_generator,
    };
    if let Some(generator) = generator {
        report.generator = Some(manifest::is_generator_valid_for_im4m(&im4m, generator)?);
    }

    Ok(report)
}
