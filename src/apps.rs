//! Command-line entry points.
//!
//! Each binary under `src/bin/` is a thin wrapper around one `run_*`
//! function here. The functions take their argument list explicitly, so
//! they stay callable without a process boundary.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, error::ErrorKind};

use crate::api::OpsClient;
use crate::archive::{package_directory, quarantine_broken_archives};
use crate::collate::{collate_weekly_markers, write_collated};
use crate::complement::{
    build_complement, collate_class_candidates, read_netto_list, write_complement,
};
use crate::config::{SamplingSettings, SearchSettings, ShortfallPolicy};
use crate::constants::sampling::{DEFAULT_SEED, TOP_CLASS_COUNT};
use crate::intervals::DateInterval;
use crate::retrieval::{fetch_publication_archives, read_document_list, retrieve_documents};
use crate::scan::{scan_classes, scan_weekly};
use crate::stats::{
    desired_allocation, read_allocation, read_yearly_totals, scan_netto_archives,
    write_allocation, write_reports,
};
use crate::types::Year;

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("epo_harvest=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

fn sampling_settings(base_seed: u64, fail_on_shortfall: bool) -> SamplingSettings {
    SamplingSettings {
        base_seed,
        shortfall: if fail_on_shortfall {
            ShortfallPolicy::Fail
        } else {
            ShortfallPolicy::Degrade
        },
        ..SamplingSettings::default()
    }
}

fn year_range_interval(years: &[Year]) -> Result<DateInterval, Box<dyn Error>> {
    let [begin, end] = years else {
        return Err("--year-range expects exactly two years".into());
    };
    let first = DateInterval::year(*begin)?;
    let last = DateInterval::year(*end)?;
    Ok(DateInterval::new(first.start(), last.end())?)
}

#[derive(Debug, Parser)]
#[command(
    name = "find-class-documents",
    disable_help_subcommand = true,
    about = "Collect publication ids per IPC class",
    long_about = "Search for every publication of the listed IPC classes over a year range, splitting any date range that counts at or over the result quota, and write one id list per completed range. Ranges already covered by marker files are skipped."
)]
struct FindClassDocumentsCli {
    #[arg(help = "Text file with one IPC class per line")]
    classes_file: PathBuf,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory the range markers are written to"
    )]
    output_dir: PathBuf,
    #[arg(long, help = "Refetch ranges whose markers already exist")]
    overwrite: bool,
    #[arg(
        long = "year-range",
        num_args = 2,
        value_names = ["BEGIN", "END"],
        default_values_t = [1970, 2021],
        help = "First and last publication year to cover, inclusive"
    )]
    year_range: Vec<Year>,
}

pub fn run_find_class_documents<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_logging();
    let Some(cli) = parse_cli::<FindClassDocumentsCli, _>(
        std::iter::once("find-class-documents".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let classes = read_document_list(&cli.classes_file)?;
    let full = year_range_interval(&cli.year_range)?;
    let client = OpsClient::new();
    let written = scan_classes(
        &client,
        &classes,
        &full,
        &cli.output_dir,
        &SearchSettings::default(),
        cli.overwrite,
    )?;
    println!(
        "Wrote {written} range marker(s) to {}",
        cli.output_dir.display()
    );
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "find-weekly-documents",
    disable_help_subcommand = true,
    about = "Sample random publication ids week by week",
    long_about = "Spread each year's desired count over its weeks and sample that many result indices uniformly from each drawn week, writing one id list per week. Weeks whose markers exist are skipped."
)]
struct FindWeeklyDocumentsCli {
    #[arg(help = "Allocation JSON with desired counts per year and class")]
    sample_file: PathBuf,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory the weekly markers are written to"
    )]
    output_dir: PathBuf,
    #[arg(long, help = "Resample weeks whose markers already exist")]
    overwrite: bool,
    #[arg(
        long = "random-seed",
        default_value_t = DEFAULT_SEED,
        help = "Base seed added to each year when seeding its generator"
    )]
    random_seed: u64,
    #[arg(
        long = "fail-on-shortfall",
        help = "Abort instead of degrading when a week cannot fill its draw count"
    )]
    fail_on_shortfall: bool,
}

pub fn run_find_weekly_documents<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_logging();
    let Some(cli) = parse_cli::<FindWeeklyDocumentsCli, _>(
        std::iter::once("find-weekly-documents".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let totals = read_yearly_totals(&cli.sample_file)?;
    let client = OpsClient::new();
    let written = scan_weekly(
        &client,
        &totals,
        &cli.output_dir,
        &SearchSettings::default(),
        &sampling_settings(cli.random_seed, cli.fail_on_shortfall),
        cli.overwrite,
    )?;
    println!(
        "Wrote {written} weekly sample marker(s) to {}",
        cli.output_dir.display()
    );
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "collate-documents",
    disable_help_subcommand = true,
    about = "Collate weekly sample markers into per-year id lists"
)]
struct CollateDocumentsCli {
    #[arg(help = "Directory holding the weekly sample markers")]
    doc_dir: PathBuf,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory the collated lists are written to"
    )]
    output_dir: PathBuf,
}

pub fn run_collate_documents<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_logging();
    let Some(cli) = parse_cli::<CollateDocumentsCli, _>(
        std::iter::once("collate-documents".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let yearly = collate_weekly_markers(&cli.doc_dir)?;
    write_collated(&yearly, &cli.output_dir)?;
    println!(
        "Collated {} year(s) into {}",
        yearly.len(),
        cli.output_dir.display()
    );
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "retrieve-documents",
    disable_help_subcommand = true,
    about = "Fetch endpoint payloads and drawings for listed documents",
    long_about = "Fetch every published-data endpoint and drawing page for each listed document into its own directory. Status markers make interrupted runs resumable."
)]
struct RetrieveDocumentsCli {
    #[arg(help = "Text file with one document id per line")]
    document_list: PathBuf,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory the per-document directories are created in"
    )]
    output_dir: PathBuf,
    #[arg(long, help = "Refetch files and documents already on disk")]
    overwrite: bool,
}

pub fn run_retrieve_documents<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_logging();
    let Some(cli) = parse_cli::<RetrieveDocumentsCli, _>(
        std::iter::once("retrieve-documents".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let documents = read_document_list(&cli.document_list)?;
    let client = OpsClient::new();
    let report = retrieve_documents(&client, &documents, &cli.output_dir, cli.overwrite)?;
    println!(
        "{} fetched, {} skipped, {} missing, {} failed",
        report.fetched, report.skipped, report.missing, report.failed
    );
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "fetch-publication-archives",
    disable_help_subcommand = true,
    about = "Download full publication archives for listed documents"
)]
struct FetchPublicationArchivesCli {
    #[arg(help = "Text file with one document id per line")]
    document_list: PathBuf,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory the archives are written to"
    )]
    output_dir: PathBuf,
    #[arg(long, help = "Refetch archives already on disk")]
    overwrite: bool,
}

pub fn run_fetch_publication_archives<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_logging();
    let Some(cli) = parse_cli::<FetchPublicationArchivesCli, _>(
        std::iter::once("fetch-publication-archives".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let documents = read_document_list(&cli.document_list)?;
    let client = OpsClient::new();
    let report =
        fetch_publication_archives(&client, &documents, &cli.output_dir, cli.overwrite)?;
    println!(
        "{} fetched, {} skipped, {} failed",
        report.fetched, report.skipped, report.failed
    );
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "check-archives",
    disable_help_subcommand = true,
    about = "Quarantine publication archives that fail to extract",
    long_about = "Try a full extraction of every publication archive in the directory and move the ones that fail into a broken_files/ subdirectory."
)]
struct CheckArchivesCli {
    #[arg(help = "Directory holding the downloaded publication archives")]
    archive_dir: PathBuf,
}

pub fn run_check_archives<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_logging();
    let Some(cli) = parse_cli::<CheckArchivesCli, _>(
        std::iter::once("check-archives".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let moved = quarantine_broken_archives(&cli.archive_dir)?;
    println!("Moved {} broken archive(s)", moved.len());
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "class-statistics",
    disable_help_subcommand = true,
    about = "Tally classifications over downloaded archives",
    long_about = "Parse every downloaded publication archive, write the classification summary reports, and draw the desired per-year class allocation for complement sampling."
)]
struct ClassStatisticsCli {
    #[arg(help = "Directory holding the downloaded netto archives")]
    netto_dir: PathBuf,
    #[arg(
        long = "output-directory",
        value_name = "DIR",
        default_value = ".",
        help = "Directory the reports are written to"
    )]
    output_directory: PathBuf,
    #[arg(
        long = "sample-ratio",
        default_value_t = 1.0,
        help = "Complement draws per netto patent"
    )]
    sample_ratio: f64,
    #[arg(
        long = "random-seed",
        default_value_t = DEFAULT_SEED,
        help = "Base seed added to each year when seeding its generator"
    )]
    random_seed: u64,
    #[arg(
        long = "most-common-k",
        default_value_t = TOP_CLASS_COUNT,
        help = "Size of the top main-class table the draws are limited to"
    )]
    most_common_k: usize,
    #[arg(
        long = "fail-on-shortfall",
        help = "Abort instead of degrading when a year has no eligible documents"
    )]
    fail_on_shortfall: bool,
}

pub fn run_class_statistics<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_logging();
    let Some(cli) = parse_cli::<ClassStatisticsCli, _>(
        std::iter::once("class-statistics".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let scan = scan_netto_archives(&cli.netto_dir)?;
    write_reports(&scan, &cli.output_directory, cli.most_common_k)?;

    let mut settings = sampling_settings(cli.random_seed, cli.fail_on_shortfall);
    settings.top_class_count = cli.most_common_k;
    let allocation = desired_allocation(&scan.tally, cli.sample_ratio, &settings)?;
    let path = write_allocation(&allocation, cli.sample_ratio, &cli.output_directory)?;
    println!("Wrote allocation to {}", path.display());
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "build-complement",
    disable_help_subcommand = true,
    about = "Sample the complement of the netto list from class scans",
    long_about = "Draw the allocated number of ids per year and class from the class-scan pools, excluding everything on the netto list, and write the complement lists."
)]
struct BuildComplementCli {
    #[arg(help = "Allocation JSON with desired counts per year and class")]
    sample_list: PathBuf,
    #[arg(help = "Text file with the netto ids to exclude")]
    netto_list: PathBuf,
    #[arg(help = "Directory holding the class range markers")]
    class_patents: PathBuf,
    #[arg(
        long = "output-directory",
        value_name = "DIR",
        default_value = ".",
        help = "Directory the complement lists are written to"
    )]
    output_directory: PathBuf,
    #[arg(
        long = "random-seed",
        default_value_t = DEFAULT_SEED,
        help = "Base seed added to each year when seeding its generator"
    )]
    random_seed: u64,
    #[arg(
        long = "fail-on-shortfall",
        help = "Abort instead of degrading when a stratum cannot fill its count"
    )]
    fail_on_shortfall: bool,
}

pub fn run_build_complement<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_logging();
    let Some(cli) = parse_cli::<BuildComplementCli, _>(
        std::iter::once("build-complement".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let allocation = read_allocation(&cli.sample_list)?;
    let netto = read_netto_list(&cli.netto_list)?;
    let pools = collate_class_candidates(&cli.class_patents, &netto)?;
    let sample = build_complement(
        &pools,
        &allocation,
        &sampling_settings(cli.random_seed, cli.fail_on_shortfall),
    )?;
    write_complement(&sample, &cli.output_directory)?;
    println!("Sampled {} complement document(s)", sample.all.len());
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "package-patents",
    disable_help_subcommand = true,
    about = "Bundle extracted patent info and drawings into one archive",
    long_about = "Extract the document XML of every publication archive in the directory and bundle the parsed patent info plus drawings into a single archive named after the directory."
)]
struct PackagePatentsCli {
    #[arg(help = "Directory of per-patent publication archives")]
    input_dir: PathBuf,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory the bundle is written to"
    )]
    output_dir: PathBuf,
}

pub fn run_package_patents<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_logging();
    let Some(cli) = parse_cli::<PackagePatentsCli, _>(
        std::iter::once("package-patents".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let bundle = package_directory(&cli.input_dir, &cli.output_dir)?;
    println!("Packaged into {}", bundle.display());
    Ok(())
}
