//! The single-action binary.
//!
//! `curator_cli` exposes each action as a subcommand (filters passed as a
//! YAML/JSON list via `--filter-list`) plus the deepfreeze subcommands.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

use curator::actions::{
    alias::{AliasOptions, AliasSide},
    allocation::{AllocationOptions, ClusterRoutingOptions, ReplicasOptions},
    cold2frozen::Cold2FrozenOptions,
    create_index::CreateIndexOptions,
    delete::DeleteIndicesOptions,
    forcemerge::ForcemergeOptions,
    index_settings::IndexSettingsOptions,
    open_close::{CloseOptions, OpenOptions},
    reindex::ReindexOptions,
    rollover::{RolloverConditions, RolloverOptions},
    shrink::ShrinkOptions,
    snapshot::{DeleteSnapshotsOptions, RestoreOptions, SnapshotOptions},
    ActionContext, ActionOutcome, ActionSpec, CommonOptions, WaitOptions,
};
use curator::deepfreeze::cleanup::CleanupParams;
use curator::deepfreeze::rotate::RotateParams;
use curator::deepfreeze::thaw::ThawParams;
use curator::deepfreeze::types::{RotateBy, Settings, Style};
use curator::filter::FilterSpec;
use curator::{Deepfreeze, Error};
use curator_cli_support::{connect, exit_with, init_logging, GlobalFlags};
use curator_storage::{RetrievalTier, S3Config, S3ObjectStore, StorageClass};

#[derive(Parser, Debug)]
#[command(name = "curator_cli")]
#[command(about = "Run a single curator action or deepfreeze operation")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalFlags,

    /// Validate and report without mutating anything
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by every filtered action subcommand.
#[derive(Debug, Clone, Args)]
struct FilteredArgs {
    /// Filters as a YAML or JSON list
    #[arg(long)]
    filter_list: String,

    #[arg(long)]
    ignore_empty_list: bool,

    #[arg(long)]
    allow_ilm_indices: bool,

    #[arg(long)]
    include_hidden: bool,

    /// Per-request timeout override, seconds
    #[arg(long)]
    timeout_override: Option<u64>,
}

impl FilteredArgs {
    fn common(&self) -> CommonOptions {
        CommonOptions {
            timeout_override: self.timeout_override,
            continue_if_exception: false,
            disable_action: false,
            ignore_empty_list: self.ignore_empty_list,
            allow_ilm_indices: self.allow_ilm_indices,
            include_hidden: self.include_hidden,
        }
    }

    fn filters(&self) -> Result<Vec<FilterSpec>, Error> {
        Ok(serde_yaml::from_str(&self.filter_list)?)
    }
}

#[derive(Debug, Clone, Args)]
struct S3Flags {
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    s3_region: String,

    /// Custom S3-compatible endpoint
    #[arg(long)]
    s3_endpoint: Option<String>,
}

impl S3Flags {
    async fn store(&self) -> Result<Arc<S3ObjectStore>, curator_storage::StorageError> {
        let config = match &self.s3_endpoint {
            Some(endpoint) => S3Config::compatible(self.s3_region.clone(), endpoint.clone()),
            None => S3Config::aws(self.s3_region.clone()),
        };
        Ok(Arc::new(S3ObjectStore::new(config).await?))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete the filtered indices
    #[command(name = "delete_indices")]
    DeleteIndices {
        #[command(flatten)]
        base: FilteredArgs,
    },

    /// Close the filtered indices
    Close {
        #[command(flatten)]
        base: FilteredArgs,
        #[arg(long)]
        delete_aliases: bool,
        #[arg(long)]
        skip_flush: bool,
    },

    /// Open the filtered indices
    Open {
        #[command(flatten)]
        base: FilteredArgs,
    },

    /// Forcemerge the filtered indices
    Forcemerge {
        #[command(flatten)]
        base: FilteredArgs,
        #[arg(long)]
        max_num_segments: u32,
        #[arg(long, default_value_t = 0)]
        delay: u64,
    },

    /// Apply a routing allocation setting to the filtered indices
    Allocation {
        #[command(flatten)]
        base: FilteredArgs,
        #[arg(long)]
        key: String,
        #[arg(long)]
        value: Option<String>,
        #[arg(long, default_value = "require")]
        allocation_type: String,
        #[arg(long)]
        wait_for_completion: bool,
    },

    /// Set cluster-level routing
    #[command(name = "cluster_routing")]
    ClusterRouting {
        #[arg(long)]
        routing_type: String,
        #[arg(long)]
        value: String,
    },

    /// Set the replica count of the filtered indices
    Replicas {
        #[command(flatten)]
        base: FilteredArgs,
        #[arg(long)]
        count: u32,
    },

    /// Roll an alias over
    Rollover {
        #[arg(long)]
        name: String,
        #[arg(long)]
        max_age: Option<String>,
        #[arg(long)]
        max_docs: Option<u64>,
        #[arg(long)]
        max_size: Option<String>,
        #[arg(long)]
        new_index: Option<String>,
    },

    /// Snapshot the filtered indices
    Snapshot {
        #[command(flatten)]
        base: FilteredArgs,
        #[arg(long)]
        repository: String,
        #[arg(long, default_value = "curator-%Y%m%d%H%M%S")]
        name: String,
        #[arg(long)]
        ignore_unavailable: bool,
        #[arg(long)]
        partial: bool,
        #[arg(long)]
        skip_repo_fs_check: bool,
    },

    /// Restore from the filtered snapshots
    Restore {
        #[command(flatten)]
        base: FilteredArgs,
        #[arg(long)]
        repository: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        rename_pattern: Option<String>,
        #[arg(long)]
        rename_replacement: Option<String>,
        #[arg(long)]
        include_aliases: bool,
    },

    /// Delete the filtered snapshots
    #[command(name = "delete_snapshots")]
    DeleteSnapshots {
        #[command(flatten)]
        base: FilteredArgs,
        #[arg(long)]
        repository: String,
        #[arg(long, default_value_t = 3)]
        retry_count: u32,
        #[arg(long, default_value_t = 120)]
        retry_interval: u64,
    },

    /// Shrink the filtered indices
    Shrink {
        #[command(flatten)]
        base: FilteredArgs,
        #[arg(long, default_value_t = 1)]
        number_of_shards: u32,
        #[arg(long, default_value = "DETERMINISTIC")]
        shrink_node: String,
        #[arg(long, default_value = "")]
        shrink_prefix: String,
        #[arg(long, default_value = "-shrink")]
        shrink_suffix: String,
        #[arg(long)]
        copy_aliases: bool,
        #[arg(long)]
        keep_source: bool,
    },

    /// Reindex via a request body (with curator's sentinels)
    Reindex {
        #[command(flatten)]
        base: FilteredArgs,
        /// Reindex API request body, JSON
        #[arg(long)]
        request_body: String,
        #[arg(long)]
        slices: Option<u32>,
        #[arg(long)]
        requests_per_second: Option<f64>,
        #[arg(long, default_value = "")]
        migration_prefix: String,
        #[arg(long, default_value = "")]
        migration_suffix: String,
    },

    /// Atomically add/remove indices on an alias
    Alias {
        #[arg(long)]
        name: String,
        /// Filters selecting indices to add, YAML/JSON list
        #[arg(long)]
        add: Option<String>,
        /// Filters selecting indices to remove, YAML/JSON list
        #[arg(long)]
        remove: Option<String>,
        #[arg(long)]
        warn_if_no_indices: bool,
    },

    /// Create an index
    #[command(name = "create_index")]
    CreateIndex {
        #[arg(long)]
        name: String,
        /// Settings/mappings body, YAML/JSON
        #[arg(long)]
        extra_settings: Option<String>,
    },

    /// Apply settings to the filtered indices
    #[command(name = "index_settings")]
    IndexSettings {
        #[command(flatten)]
        base: FilteredArgs,
        /// Settings document, YAML/JSON
        #[arg(long)]
        settings: String,
        #[arg(long)]
        ignore_unavailable: bool,
        #[arg(long)]
        preserve_existing: bool,
    },

    /// Remount cold searchable snapshots on the frozen tier
    Cold2frozen {
        #[command(flatten)]
        base: FilteredArgs,
    },

    /// S3/Glacier repository lifecycle management
    #[command(subcommand)]
    Deepfreeze(DeepfreezeCommand),
}

#[derive(Subcommand, Debug)]
enum DeepfreezeCommand {
    /// One-shot initialization
    Setup {
        #[command(flatten)]
        s3: S3Flags,
        #[arg(long, default_value = "deepfreeze")]
        repo_name_prefix: String,
        #[arg(long, default_value = "deepfreeze")]
        bucket_name_prefix: String,
        #[arg(long, default_value = "snapshots")]
        base_path_prefix: String,
        #[arg(long, default_value = "GLACIER")]
        storage_class: String,
        #[arg(long, default_value = "path")]
        rotate_by: String,
        #[arg(long, default_value = "oneup")]
        style: String,
        #[arg(long, default_value_t = 6)]
        keep: u32,
    },

    /// Show repositories and thaw requests
    Status {
        #[command(flatten)]
        s3: S3Flags,
        /// Tab-separated machine-readable output
        #[arg(long)]
        porcelain: bool,
    },

    /// Rotate in a new repository and retire the oldest
    Rotate {
        #[command(flatten)]
        s3: S3Flags,
        /// Suffix year (style=date only)
        #[arg(long)]
        year: Option<i32>,
        /// Suffix month (style=date only)
        #[arg(long)]
        month: Option<u32>,
        #[arg(long)]
        keep: Option<u32>,
    },

    /// Thaw archived repositories for a date window
    Thaw {
        #[command(flatten)]
        s3: S3Flags,
        /// Window start, ISO-8601 or YYYY-MM-DD
        #[arg(long, required_unless_present_any = ["check_status", "list"])]
        start: Option<String>,
        /// Window end, ISO-8601 or YYYY-MM-DD
        #[arg(long, required_unless_present_any = ["check_status", "list"])]
        end: Option<String>,
        #[arg(long, default_value_t = 7)]
        duration_days: u32,
        #[arg(long, default_value = "Standard")]
        retrieval_tier: String,
        /// Poll until the request completes
        #[arg(long)]
        sync: bool,
        /// Check restore progress instead of creating a request
        #[arg(long)]
        check_status: bool,
        /// Restrict --check-status to one request
        #[arg(long)]
        request_id: Option<String>,
        /// List requests instead of creating one
        #[arg(long)]
        list: bool,
        #[arg(long)]
        include_completed: bool,
        /// Tab-separated machine-readable output
        #[arg(long)]
        porcelain: bool,
    },

    /// Unmount thawed repositories and return objects to cold storage
    Refreeze {
        #[command(flatten)]
        s3: S3Flags,
        #[arg(long, required_unless_present = "all")]
        request_id: Option<String>,
        /// Refreeze every non-terminal request
        #[arg(long)]
        all: bool,
    },

    /// Refreeze expired windows, prune old requests and orphaned policies
    Cleanup {
        #[command(flatten)]
        s3: S3Flags,
        #[arg(long, default_value_t = 30)]
        request_retention_days: u32,
    },

    /// Reconcile status-index records against the cluster
    #[command(name = "repair-metadata")]
    RepairMetadata {
        #[command(flatten)]
        s3: S3Flags,
    },
}

fn parse_utc(raw: &str) -> Result<DateTime<Utc>, Error> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| Error::Config(format!("cannot parse date: {}", raw)))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::Config(format!("cannot parse date: {}", raw)))?;
    Ok(midnight.and_utc())
}

fn print_outcome(outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Completed { affected } => println!("Completed; {} affected", affected),
        ActionOutcome::DryRun { affected } => {
            println!("Dry-run; {} would be affected", affected)
        }
        ActionOutcome::Skipped { reason } => println!("Skipped: {}", reason),
    }
}

/// Build the `ActionSpec` for an action subcommand.
fn action_spec(command: &Command) -> Result<Option<ActionSpec>, Error> {
    let spec = match command {
        Command::DeleteIndices { base } => ActionSpec::DeleteIndices {
            description: None,
            options: DeleteIndicesOptions {
                common: base.common(),
            },
            filters: base.filters()?,
        },
        Command::Close {
            base,
            delete_aliases,
            skip_flush,
        } => ActionSpec::Close {
            description: None,
            options: CloseOptions {
                common: base.common(),
                skip_flush: *skip_flush,
                delete_aliases: *delete_aliases,
            },
            filters: base.filters()?,
        },
        Command::Open { base } => ActionSpec::Open {
            description: None,
            options: OpenOptions {
                common: base.common(),
            },
            filters: base.filters()?,
        },
        Command::Forcemerge {
            base,
            max_num_segments,
            delay,
        } => ActionSpec::Forcemerge {
            description: None,
            options: ForcemergeOptions {
                common: base.common(),
                max_num_segments: *max_num_segments,
                delay: *delay,
            },
            filters: base.filters()?,
        },
        Command::Allocation {
            base,
            key,
            value,
            allocation_type,
            wait_for_completion,
        } => ActionSpec::Allocation {
            description: None,
            options: AllocationOptions {
                common: base.common(),
                key: key.clone(),
                value: value.clone(),
                allocation_type: allocation_type.clone(),
                wait: WaitOptions {
                    wait_for_completion: Some(*wait_for_completion),
                    ..Default::default()
                },
            },
            filters: base.filters()?,
        },
        Command::ClusterRouting {
            routing_type,
            value,
        } => ActionSpec::ClusterRouting {
            description: None,
            options: ClusterRoutingOptions {
                common: CommonOptions::default(),
                routing_type: routing_type.clone(),
                value: value.clone(),
                wait: WaitOptions::default(),
            },
        },
        Command::Replicas { base, count } => ActionSpec::Replicas {
            description: None,
            options: ReplicasOptions {
                common: base.common(),
                count: *count,
                wait: WaitOptions::default(),
            },
            filters: base.filters()?,
        },
        Command::Rollover {
            name,
            max_age,
            max_docs,
            max_size,
            new_index,
        } => ActionSpec::Rollover {
            description: None,
            options: RolloverOptions {
                common: CommonOptions::default(),
                name: name.clone(),
                conditions: RolloverConditions {
                    max_age: max_age.clone(),
                    max_docs: *max_docs,
                    max_size: max_size.clone(),
                },
                new_index: new_index.clone(),
                extra_settings: None,
            },
        },
        Command::Snapshot {
            base,
            repository,
            name,
            ignore_unavailable,
            partial,
            skip_repo_fs_check,
        } => ActionSpec::Snapshot {
            description: None,
            options: SnapshotOptions {
                common: base.common(),
                repository: repository.clone(),
                name: name.clone(),
                ignore_unavailable: *ignore_unavailable,
                include_global_state: true,
                partial: *partial,
                skip_repo_fs_check: *skip_repo_fs_check,
                wait: WaitOptions::default(),
            },
            filters: base.filters()?,
        },
        Command::Restore {
            base,
            repository,
            name,
            rename_pattern,
            rename_replacement,
            include_aliases,
        } => ActionSpec::Restore {
            description: None,
            options: RestoreOptions {
                common: base.common(),
                repository: repository.clone(),
                name: name.clone(),
                indices: Vec::new(),
                rename_pattern: rename_pattern.clone(),
                rename_replacement: rename_replacement.clone(),
                include_aliases: *include_aliases,
                ignore_unavailable: false,
                include_global_state: false,
                extra_settings: None,
                wait: WaitOptions::default(),
            },
            filters: base.filters()?,
        },
        Command::DeleteSnapshots {
            base,
            repository,
            retry_count,
            retry_interval,
        } => ActionSpec::DeleteSnapshots {
            description: None,
            options: DeleteSnapshotsOptions {
                common: base.common(),
                repository: repository.clone(),
                retry_count: *retry_count,
                retry_interval: *retry_interval,
            },
            filters: base.filters()?,
        },
        Command::Shrink {
            base,
            number_of_shards,
            shrink_node,
            shrink_prefix,
            shrink_suffix,
            copy_aliases,
            keep_source,
        } => ActionSpec::Shrink {
            description: None,
            options: ShrinkOptions {
                common: base.common(),
                shrink_node: shrink_node.clone(),
                node_filters: Default::default(),
                number_of_shards: *number_of_shards,
                shrink_prefix: shrink_prefix.clone(),
                shrink_suffix: shrink_suffix.clone(),
                copy_aliases: *copy_aliases,
                delete_after: !*keep_source,
                post_allocation: None,
                extra_settings: None,
                wait: WaitOptions::default(),
            },
            filters: base.filters()?,
        },
        Command::Reindex {
            base,
            request_body,
            slices,
            requests_per_second,
            migration_prefix,
            migration_suffix,
        } => ActionSpec::Reindex {
            description: None,
            options: ReindexOptions {
                common: base.common(),
                request_body: serde_json::from_str(request_body)?,
                slices: *slices,
                requests_per_second: *requests_per_second,
                migration_prefix: migration_prefix.clone(),
                migration_suffix: migration_suffix.clone(),
                remote_filters: Vec::new(),
                wait: WaitOptions::default(),
            },
            filters: base.filters()?,
        },
        Command::Alias {
            name,
            add,
            remove,
            warn_if_no_indices,
        } => {
            let parse_side = |raw: &Option<String>| -> Result<Option<AliasSide>, Error> {
                match raw {
                    Some(list) => Ok(Some(AliasSide {
                        filters: serde_yaml::from_str(list)?,
                    })),
                    None => Ok(None),
                }
            };
            ActionSpec::Alias {
                description: None,
                options: AliasOptions {
                    common: CommonOptions::default(),
                    name: name.clone(),
                    extra_settings: None,
                    warn_if_no_indices: *warn_if_no_indices,
                },
                add: parse_side(add)?,
                remove: parse_side(remove)?,
            }
        }
        Command::CreateIndex {
            name,
            extra_settings,
        } => ActionSpec::CreateIndex {
            description: None,
            options: CreateIndexOptions {
                common: CommonOptions::default(),
                name: name.clone(),
                extra_settings: extra_settings
                    .as_deref()
                    .map(serde_yaml::from_str)
                    .transpose()?,
            },
        },
        Command::IndexSettings {
            base,
            settings,
            ignore_unavailable,
            preserve_existing,
        } => ActionSpec::IndexSettings {
            description: None,
            options: IndexSettingsOptions {
                common: base.common(),
                index_settings: serde_yaml::from_str(settings)?,
                ignore_unavailable: *ignore_unavailable,
                preserve_existing: *preserve_existing,
            },
            filters: base.filters()?,
        },
        Command::Cold2frozen { base } => ActionSpec::Cold2frozen {
            description: None,
            options: Cold2FrozenOptions {
                common: base.common(),
            },
            filters: base.filters()?,
        },
        Command::Deepfreeze(_) => return Ok(None),
    };
    Ok(Some(spec))
}

async fn run_deepfreeze(
    command: &DeepfreezeCommand,
    client: curator_client::EsClient,
    dry_run: bool,
) -> Result<(), Error> {
    let s3 = match command {
        DeepfreezeCommand::Setup { s3, .. }
        | DeepfreezeCommand::Status { s3, .. }
        | DeepfreezeCommand::Rotate { s3, .. }
        | DeepfreezeCommand::Thaw { s3, .. }
        | DeepfreezeCommand::Refreeze { s3, .. }
        | DeepfreezeCommand::Cleanup { s3, .. }
        | DeepfreezeCommand::RepairMetadata { s3 } => s3,
    };
    let store = s3.store().await?;
    let deepfreeze = Deepfreeze::new(client, store);

    match command {
        DeepfreezeCommand::Setup {
            repo_name_prefix,
            bucket_name_prefix,
            base_path_prefix,
            storage_class,
            rotate_by,
            style,
            keep,
            ..
        } => {
            let settings = Settings {
                repo_name_prefix: repo_name_prefix.clone(),
                bucket_name_prefix: bucket_name_prefix.clone(),
                base_path_prefix: base_path_prefix.clone(),
                storage_class: storage_class
                    .parse::<StorageClass>()
                    .map_err(Error::Config)?,
                rotate_by: match rotate_by.as_str() {
                    "bucket" => RotateBy::Bucket,
                    "path" => RotateBy::Path,
                    other => {
                        return Err(Error::Config(format!("invalid rotate_by: {}", other)))
                    }
                },
                last_suffix: String::new(),
                provider: "aws".to_string(),
                style: match style.as_str() {
                    "oneup" => Style::Oneup,
                    "date" => Style::Date,
                    other => return Err(Error::Config(format!("invalid style: {}", other))),
                },
                keep: *keep,
            };
            let report = deepfreeze.setup(settings, dry_run).await?;
            println!(
                "Initialized repository {} (bucket {}, path {})",
                report.repository, report.bucket, report.base_path
            );
        }

        DeepfreezeCommand::Status { porcelain, .. } => {
            let (repos, requests) = deepfreeze.status_overview().await?;
            if *porcelain {
                for request in &requests {
                    println!(
                        "REQUEST\t{}\t{}\t{}\t{}\t{}",
                        request.request_id,
                        request.status,
                        request.created_at.to_rfc3339(),
                        request.start_date.to_rfc3339(),
                        request.end_date.to_rfc3339(),
                    );
                }
                for repo in &repos {
                    println!(
                        "REPO\t{}\t{}\t{}\t{}\t{}\t-",
                        repo.name, repo.bucket, repo.base_path, repo.thaw_state, repo.is_mounted,
                    );
                }
            } else {
                println!("Repositories:");
                for repo in &repos {
                    println!(
                        "  {}  state={} mounted={} indices={}",
                        repo.name,
                        repo.thaw_state,
                        repo.is_mounted,
                        repo.indices.len()
                    );
                }
                println!("Thaw requests:");
                for request in &requests {
                    println!(
                        "  {}  status={} repos={}",
                        request.request_id,
                        request.status,
                        request.repos.len()
                    );
                }
            }
        }

        DeepfreezeCommand::Rotate {
            year, month, keep, ..
        } => {
            let report = deepfreeze
                .rotate(
                    RotateParams {
                        year: *year,
                        month: *month,
                        keep: *keep,
                    },
                    dry_run,
                )
                .await?;
            println!(
                "Rotated to {} ({} policies versioned, {} templates updated, {} unmounted)",
                report.new_repository,
                report.policies_created.len(),
                report.templates_updated.len(),
                report.unmounted.len()
            );
        }

        DeepfreezeCommand::Thaw {
            start,
            end,
            duration_days,
            retrieval_tier,
            sync,
            check_status,
            request_id,
            list,
            include_completed,
            porcelain,
            ..
        } => {
            if *list {
                let requests = deepfreeze.thaw_list(*include_completed).await?;
                for request in requests {
                    println!(
                        "{}\t{}\t{}\t{} repos",
                        request.request_id,
                        request.status,
                        request.created_at.to_rfc3339(),
                        request.repos.len()
                    );
                }
                return Ok(());
            }
            if *check_status {
                let reports = deepfreeze.thaw_status(request_id.as_deref()).await?;
                for report in &reports {
                    if *porcelain {
                        println!("{}", report.porcelain());
                    } else {
                        println!(
                            "Request {}: {} ({} repositories)",
                            report.request.request_id,
                            report.request.status,
                            report.repos.len()
                        );
                        for repo in &report.repos {
                            println!(
                                "  {}  {} restored {}/{}",
                                repo.name, repo.state, repo.restored, repo.total
                            );
                        }
                    }
                }
                return Ok(());
            }

            let (Some(start), Some(end)) = (start.as_deref(), end.as_deref()) else {
                return Err(Error::Config(
                    "thaw requires --start and --end".to_string(),
                ));
            };
            let mut params = ThawParams::new(parse_utc(start)?, parse_utc(end)?);
            params.duration_days = *duration_days;
            params.retrieval_tier = retrieval_tier
                .parse::<RetrievalTier>()
                .map_err(Error::Config)?;
            params.sync = *sync;
            let report = deepfreeze.thaw_create(params, dry_run).await?;
            if *porcelain {
                println!("{}", report.porcelain());
            } else {
                println!(
                    "Thaw request {} ({} repositories, status {})",
                    report.request.request_id,
                    report.repos.len(),
                    report.request.status
                );
            }
        }

        DeepfreezeCommand::Refreeze {
            request_id, all, ..
        } => {
            let id = if *all { None } else { request_id.as_deref() };
            let report = deepfreeze.refreeze(id, dry_run).await?;
            println!(
                "Refroze {} repositories across {} requests ({} indices deleted)",
                report.repositories_refrozen.len(),
                report.requests_refrozen.len(),
                report.indices_deleted.len()
            );
        }

        DeepfreezeCommand::Cleanup {
            request_retention_days,
            ..
        } => {
            let report = deepfreeze
                .cleanup(
                    CleanupParams {
                        request_retention_days: *request_retention_days,
                    },
                    dry_run,
                )
                .await?;
            println!(
                "Cleanup: {} refrozen, {} requests deleted, {} policies deleted",
                report.repositories_refrozen.len(),
                report.requests_deleted.len(),
                report.policies_deleted.len()
            );
        }

        DeepfreezeCommand::RepairMetadata { .. } => {
            let report = deepfreeze.repair_metadata(dry_run).await?;
            println!(
                "Repair: {} records created, {} fixed, {} rescanned",
                report.records_created.len(),
                report.records_fixed.len(),
                report.records_rescanned.len()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.global.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(3);
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(3);
    }

    let client = match connect(&config).await {
        Ok(Some(client)) => client,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(3);
        }
    };

    if let Command::Deepfreeze(command) = &cli.command {
        return match run_deepfreeze(command, client, cli.dry_run).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => exit_with(&e),
        };
    }

    let spec = match action_spec(&cli.command) {
        Ok(Some(spec)) => spec,
        Ok(None) => unreachable!("deepfreeze handled above"),
        Err(e) => exit_with(&e),
    };
    let ctx = ActionContext {
        client: &client,
        dry_run: cli.dry_run,
        now_epoch: Utc::now().timestamp(),
    };
    match spec.run(&ctx).await {
        Ok(outcome) => {
            print_outcome(&outcome);
            ExitCode::SUCCESS
        }
        Err(e) => exit_with(&e),
    }
}
