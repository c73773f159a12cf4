use anyhow::{bail, Result};

use vodrecover::{parse_timestamp, BroadcastKey};

use super::output::{finish, print_outcome};
use super::Context;

pub async fn cmd_recover(ctx: &Context, channel: &str, broadcast_id: &str, timestamp: &str) -> Result<()> {
    let Some(start) = parse_timestamp(timestamp) else {
        bail!("invalid timestamp {timestamp:?}, expected YYYY-MM-DD HH:MM:SS (UTC)");
    };
    let key = BroadcastKey::new(channel, broadcast_id, Some(start))?;

    eprintln!("🔎 Recovering {channel} / {broadcast_id} from {timestamp}");
    let outcome = ctx.orchestrator().recover(&key, &[]).await?;
    print_outcome(&outcome);
    finish(ctx, &outcome.vod).await
}
