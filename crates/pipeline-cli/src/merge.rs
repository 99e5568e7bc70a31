//! `docpipeline merge [--apply]`: preview, or apply, the correspondent
//! merges planned from the document-management service's current state.

use pipeline_correspondent::plan_merges;
use pipeline_delivery::DeliveryClient;
use pipeline_types::Correspondent;
use pipeline_utils::ExitCode;

use crate::args::MergeArgs;

pub async fn run(config: &pipeline_config::Config, args: &MergeArgs) -> ExitCode {
    let client = DeliveryClient::new(config.delivery.service_url.clone(), config.delivery.api_token.clone());

    let correspondents = match client.list_correspondents().await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!(error = %e, "failed to list correspondents");
            return ExitCode::Aborted;
        }
    };
    let correspondents: Vec<Correspondent> = correspondents.into_iter().map(Correspondent::from).collect();

    let plans = plan_merges(&correspondents);
    if plans.is_empty() {
        println!("no duplicate correspondents found");
        return ExitCode::Success;
    }

    for plan in &plans {
        println!(
            "{}: keep #{} ({}), absorb {:?}, {} documents total",
            plan.normalized_key, plan.primary_id, plan.primary_display_name, plan.duplicate_ids, plan.merged_document_count
        );
    }

    if !args.apply {
        println!("dry run: pass --apply to perform these merges");
        return ExitCode::Success;
    }

    let mut failed = false;
    for plan in &plans {
        if let Err(e) = client.merge_correspondents(plan.primary_id, &plan.duplicate_ids).await {
            tracing::error!(error = %e, normalized_key = %plan.normalized_key, "failed to apply merge");
            failed = true;
        }
    }

    if failed {
        ExitCode::PartialCompletion
    } else {
        ExitCode::Success
    }
}
