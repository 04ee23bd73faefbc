//! `argos serve`: start the HTTP/WebSocket API.

use clap::Args;

use argos_server::AppState;

use crate::context::CliContext;

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long, short, default_value_t = 8787)]
    pub port: u16,
}

pub async fn run(ctx: CliContext, args: ServeArgs) -> anyhow::Result<u8> {
    let CliContext {
        config,
        workspace,
        store,
    } = ctx;
    let state = AppState::new(store, config, workspace);
    argos_server::serve(state, args.port).await?;
    Ok(0)
}
