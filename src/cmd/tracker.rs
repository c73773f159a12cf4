use anyhow::{anyhow, Result};

use vodrecover::TrackerLink;

use super::output::{finish, print_outcome};
use super::Context;

pub async fn cmd_tracker(ctx: &Context, url: &str) -> Result<()> {
    let link = TrackerLink::parse(url).ok_or_else(|| {
        anyhow!("unrecognized tracker URL: {url} (expected TwitchTracker, StreamsCharts or SullyGnome)")
    })?;

    eprintln!("🔎 Recovering {} / {} via {}", link.channel, link.broadcast_id, link.site);
    let outcome = ctx.orchestrator().recover_from_tracker(&link).await?;
    print_outcome(&outcome);
    finish(ctx, &outcome.vod).await
}
