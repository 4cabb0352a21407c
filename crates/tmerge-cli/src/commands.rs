use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use tmerge_batch::{MergeEngine, MergeReport, OperationHandle, OperationState, TokioScheduler};
use tmerge_engine::{load_settings, MergeSettings};
use tmerge_hierarchy::{branch_options, HierarchyResolver, TrunkPicker, TrunkWidget};
use tmerge_store::{FieldSynonyms, InMemoryTermStore, StoreSnapshot, TermStore};
use tmerge_types::{FieldName, TermId, VocabularyId};
use tracing::info;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Tree(args) => cmd_tree(args, format),
        Command::Candidates(args) => cmd_candidates(args, format),
        Command::Merge(args) => cmd_merge(args, format),
        Command::Settings(args) => cmd_settings(args),
    }
}

fn open_store(path: &Path) -> anyhow::Result<InMemoryTermStore> {
    let snapshot = StoreSnapshot::load(path)
        .with_context(|| format!("cannot read store {}", path.display()))?;
    Ok(InMemoryTermStore::from_snapshot(snapshot)?)
}

/// Settings from `--config`, then overridden by individual flags.
fn effective_settings(args: &SettingsArgs) -> anyhow::Result<MergeSettings> {
    let mut settings = match &args.config {
        Some(path) => load_settings(path)
            .with_context(|| format!("cannot load settings from {}", path.display()))?,
        None => MergeSettings::default(),
    };
    if args.keep_branches {
        settings = settings.with_keep_branch_terms(true);
    }
    if !args.merge_fields.is_empty() {
        let fields: Vec<FieldName> = settings
            .merge_fields()
            .iter()
            .cloned()
            .chain(args.merge_fields.iter().map(|f| FieldName::from(f.as_str())))
            .collect();
        settings = settings.with_merge_fields(fields);
    }
    if !args.synonym_fields.is_empty() {
        let fields: Vec<FieldName> = settings
            .synonym_fields()
            .iter()
            .cloned()
            .chain(args.synonym_fields.iter().map(|f| FieldName::from(f.as_str())))
            .collect();
        settings = settings.with_synonym_fields(fields);
    }
    if let Some(redirect) = args.redirect {
        settings = settings.with_redirect(redirect);
    }
    if let Some(step) = args.step {
        settings = settings.with_step(step);
    }
    if args.unique {
        settings = settings.with_keep_only_unique(true);
    } else if args.no_unique {
        settings = settings.with_keep_only_unique(false);
    }
    Ok(settings)
}

fn cmd_tree(args: TreeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.store.store)?;
    let vocabulary = VocabularyId::new(args.vocabulary);
    let options = branch_options(&HierarchyResolver::new(&store).full_tree(&vocabulary)?);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&options)?),
        OutputFormat::Text if options.is_empty() => {
            println!("Vocabulary {} has no terms.", vocabulary.to_string().bold());
        }
        OutputFormat::Text => {
            for option in &options {
                println!("{}", option.label);
            }
        }
    }
    Ok(())
}

fn cmd_candidates(args: CandidatesArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.store.store)?;
    let vocabulary = VocabularyId::new(args.vocabulary);
    let resolver = HierarchyResolver::new(&store);
    let picker = TrunkPicker::build(&resolver, &vocabulary, &args.branches, args.widget)?;

    if format == OutputFormat::Json {
        let options = match &picker {
            TrunkPicker::Select { options } => Some(options),
            TrunkPicker::Autocomplete { .. } => None,
        };
        let value = serde_json::json!({ "widget": picker.widget(), "options": options });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match &picker {
        TrunkPicker::Select { .. } if args.branches.is_empty() => {
            println!("Choose branch terms first (--branch).");
        }
        TrunkPicker::Select { options } if options.is_empty() => {
            println!("{} No term is left to merge into.", "!".yellow().bold());
        }
        TrunkPicker::Select { options } => {
            for option in options {
                println!("{}", option.label);
            }
        }
        TrunkPicker::Autocomplete { tree, excluded, .. } => {
            println!(
                "{} terms, {} excluded: name the trunk with {}",
                tree.len().to_string().bold(),
                excluded.len(),
                "--trunk-name".cyan()
            );
        }
    }
    Ok(())
}

/// The trunk id, looking a name up in the first branch's vocabulary.
fn resolve_trunk(store: &dyn TermStore, args: &MergeArgs) -> anyhow::Result<TermId> {
    if let Some(trunk) = args.trunk {
        return Ok(trunk);
    }
    let Some(name) = &args.trunk_name else {
        bail!("either --trunk or --trunk-name is required");
    };
    let Some(&first) = args.branches.first() else {
        bail!("at least one --branch is required");
    };
    let vocabulary = store
        .load_term(first)?
        .with_context(|| format!("branch term {first} does not exist"))?
        .vocabulary;
    let picker = TrunkPicker::build(
        &HierarchyResolver::new(store),
        &vocabulary,
        &args.branches,
        Some(TrunkWidget::Autocomplete),
    )?;
    Ok(picker.resolve(name)?)
}

/// Wait for the terminal report, printing progress to stderr meanwhile.
async fn wait_with_progress(handle: &OperationHandle, show: bool) -> anyhow::Result<MergeReport> {
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            report = handle.wait() => return Ok(report?),
            _ = ticker.tick() => {
                let progress = handle.poll();
                if show && progress.state == OperationState::Running {
                    eprint!(
                        "\r{} {}/{} ({:.0}%)",
                        "merging".dimmed(),
                        progress.processed,
                        progress.total,
                        progress.fraction() * 100.0
                    );
                }
            }
        }
    }
}

fn cmd_merge(args: MergeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = Arc::new(open_store(&args.store.store)?);
    let settings = effective_settings(&args.settings)?;
    let trunk = resolve_trunk(&*store, &args)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let mut engine = MergeEngine::new(store.clone())
        .with_scheduler(Arc::new(TokioScheduler::new(runtime.handle().clone())))
        .with_redirects(store.clone())
        .on_complete(Arc::new(|report: &MergeReport| {
            info!(operation = %report.operation, state = %report.state, "merge reached a terminal state");
        }));
    if !args.synonym_sources.is_empty() {
        let sources = args.synonym_sources.iter().map(|f| FieldName::from(f.as_str()));
        engine = engine.with_synonyms(Arc::new(FieldSynonyms::new(sources)));
    }

    let handle = engine.merge(args.branches.iter().copied(), trunk, settings);
    let report = runtime.block_on(wait_with_progress(&handle, format == OutputFormat::Text))?;
    if format == OutputFormat::Text && report.chunks_run > 0 {
        eprintln!();
    }

    print_report(&report, format)?;

    if !args.dry_run && report.chunks_run > 0 {
        let output = args.output.as_deref().unwrap_or(&args.store.store);
        store
            .snapshot()?
            .save(output)
            .with_context(|| format!("cannot write store {}", output.display()))?;
        info!(path = %output.display(), "store written");
    }

    if !report.is_success() {
        bail!("merge {} failed", report.operation.short_id());
    }
    Ok(())
}

fn print_report(report: &MergeReport, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let mark = match report.state {
        OperationState::Completed => "✓".green().bold(),
        OperationState::CompletedWithErrors => "!".yellow().bold(),
        _ => "✗".red().bold(),
    };
    println!("{} {}", mark, report.summary());
    println!("  Operation: {}", report.operation.short_id().dimmed());
    println!("  Trunk: {}", report.trunk_path().cyan());
    println!(
        "  Processed: {}/{} in {} chunk(s), {} ms",
        report.processed,
        report.total,
        report.chunks_run,
        report.elapsed().num_milliseconds()
    );
    for problem in &report.configuration_errors {
        println!("  {} {}", "config:".yellow(), problem);
    }
    for outcome in &report.merged {
        if !outcome.skipped_fields.is_empty() {
            let skipped: Vec<&str> = outcome.skipped_fields.iter().map(FieldName::as_str).collect();
            println!(
                "  {} term {}: full trunk fields skipped: {}",
                "note:".blue(),
                outcome.branch,
                skipped.join(", ")
            );
        }
    }
    for failure in &report.errors {
        println!(
            "  {} term {} ({}): {}",
            "failed:".red(),
            failure.branch,
            failure.stage,
            failure.message
        );
    }
    Ok(())
}

fn cmd_settings(args: SettingsArgs) -> anyhow::Result<()> {
    print!("{}", effective_settings(&args)?.to_toml_string()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tmerge_store::FieldDefinition;
    use tmerge_types::{Cardinality, EntityId, FieldValue, Term};

    /// tags: A(1) -> B(2), C(3), D(4); node/1 references C and D.
    fn write_store(dir: &Path) -> std::path::PathBuf {
        let store = InMemoryTermStore::new();
        let tid = TermId::new;
        store.insert_term(Term::new(tid(1), "tags".into(), "A")).unwrap();
        store.insert_term(Term::new(tid(2), "tags".into(), "B").with_parent(tid(1))).unwrap();
        store
            .insert_term(
                Term::new(tid(3), "tags".into(), "C")
                    .with_field("field_notes", vec![FieldValue::text("from C")]),
            )
            .unwrap();
        store.insert_term(Term::new(tid(4), "tags".into(), "D")).unwrap();
        store
            .define_field(FieldDefinition::new("tags", "field_notes", Cardinality::Unlimited))
            .unwrap();
        store.insert_entity(EntityId::node(1), "field_tags", vec![tid(3), tid(4)]).unwrap();

        let path = dir.join("store.json");
        store.snapshot().unwrap().save(&path).unwrap();
        path
    }

    fn run(args: &[&str]) -> anyhow::Result<()> {
        let argv = std::iter::once("term-merge").chain(args.iter().copied());
        run_command(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn merge_writes_the_store_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_store(dir.path());
        let store_arg = path.to_str().unwrap();

        run(&[
            "merge", "--store", store_arg, "--branch", "3", "--branch", "4", "--trunk", "2",
            "--merge-field", "field_notes", "--redirect", "301",
        ])
        .unwrap();

        let merged = open_store(&path).unwrap();
        assert_eq!(merged.term_count().unwrap(), 2);
        assert_eq!(
            merged.entity_references(&EntityId::node(1), &"field_tags".into()).unwrap(),
            vec![TermId::new(2)]
        );
        assert_eq!(
            merged.get_field_values(TermId::new(2), &"field_notes".into()).unwrap(),
            vec![FieldValue::text("from C")]
        );
        assert_eq!(merged.redirects().unwrap().len(), 2);
    }

    #[test]
    fn trunk_can_be_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_store(dir.path());
        let output = dir.path().join("out.json");

        run(&[
            "merge", "--store", path.to_str().unwrap(), "--branch", "3", "--trunk-name", "B",
            "--keep-branches", "--output", output.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(open_store(&output).unwrap().term_count().unwrap(), 4);
        let untouched = open_store(&path).unwrap();
        assert_eq!(
            untouched.entity_references(&EntityId::node(1), &"field_tags".into()).unwrap(),
            vec![TermId::new(3), TermId::new(4)]
        );
    }

    #[test]
    fn naming_an_excluded_trunk_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_store(dir.path());
        let err = run(&[
            "merge", "--store", path.to_str().unwrap(), "--branch", "1", "--trunk-name", "B",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("cannot be the trunk"), "{err}");
    }

    #[test]
    fn rejected_merge_fails_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_store(dir.path());
        let before = std::fs::read_to_string(&path).unwrap();

        let err = run(&[
            "merge", "--store", path.to_str().unwrap(), "--branch", "1", "--trunk", "2",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("failed"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn dry_run_leaves_the_store_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_store(dir.path());
        let before = std::fs::read_to_string(&path).unwrap();
        run(&[
            "merge", "--store", path.to_str().unwrap(), "--branch", "3", "--trunk", "2",
            "--dry-run", "--format", "json",
        ])
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn flags_override_config_file() {
        let mut config = tempfile::NamedTempFile::new().unwrap();
        writeln!(config, "merge_fields = [\"field_notes\"]\nstep = 5\nredirect = \"default\"").unwrap();
        let args = SettingsArgs {
            config: Some(config.path().to_path_buf()),
            merge_fields: vec!["field_color".into()],
            step: std::num::NonZeroUsize::new(9),
            no_unique: true,
            ..Default::default()
        };
        let settings = effective_settings(&args).unwrap();
        assert_eq!(settings.merge_fields().len(), 2);
        assert_eq!(settings.step().get(), 9);
        assert!(!settings.keep_only_unique());
        assert_eq!(settings.redirect(), tmerge_engine::RedirectSpec::Default);
    }

    #[test]
    fn read_only_commands_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_store(dir.path());
        let store_arg = path.to_str().unwrap();
        run(&["tree", "--store", store_arg, "--vocabulary", "tags"]).unwrap();
        run(&["candidates", "--store", store_arg, "--vocabulary", "tags", "--branch", "1"]).unwrap();
        run(&[
            "candidates", "--store", store_arg, "--vocabulary", "tags", "--widget",
            "autocomplete", "--format", "json",
        ])
        .unwrap();
        run(&["settings", "--step", "3"]).unwrap();
    }
}
