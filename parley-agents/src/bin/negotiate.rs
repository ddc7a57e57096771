//! Two in-process agents negotiate one request and print the transcript.
//!
//! ```text
//! parley-negotiate [--config parley.toml] [request...]
//! ```
//!
//! Without a `[provider]` section the concierge answers from a canned
//! reply and accepts every proposal.

use async_trait::async_trait;
use parley_agents::telemetry::{init_tracing, TelemetryConfig};
use parley_agents::{
    standard_interface, AcceptAllProposals, AgentDirectory, Communicate, ModelJudgedProposals,
    ProposalPolicy,
};
use parley_core::{
    Action, ActionBody, ActionContext, ActionEnv, ActionParams, ActionResult, AgentProfile,
    ChatMessage, ConfigError, Conversation, ModelClient, ParleyConfig, ParleyResult,
};
use parley_engine::{Agent, Finish, GraphNarrower, RandomSelector};
use parley_llm::ProviderRegistry;
use std::sync::Arc;
use tokio::sync::Mutex;

const DEFAULT_REQUEST: &str = "Find a quiet hotel near the central station for two nights.";

/// Answers the latest user message with a model, or with a canned reply.
struct Answer {
    model: Option<Arc<dyn ModelClient>>,
}

#[async_trait]
impl ActionBody for Answer {
    async fn execute(
        &self,
        _params: ActionParams,
        ctx: &ActionContext,
        _env: &mut ActionEnv<'_>,
    ) -> ParleyResult<ActionResult> {
        let request = ctx
            .conversation
            .latest_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let answer = match &self.model {
            Some(model) => {
                let prompt = format!(
                    "You are {}, {}.\nAnswer this request briefly:\n{request}",
                    ctx.agent.name, ctx.agent.description
                );
                model.call(&prompt).await?
            }
            None => format!("Booked: {request}"),
        };
        Ok(ActionResult::new().with("answer", answer))
    }
}

fn request_from_args() -> String {
    let mut words = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            args.next();
        } else if !arg.starts_with("--config=") {
            words.push(arg);
        }
    }
    if words.is_empty() {
        DEFAULT_REQUEST.to_string()
    } else {
        words.join(" ")
    }
}

fn load_config() -> ParleyResult<ParleyConfig> {
    match ParleyConfig::load() {
        Ok(config) => Ok(config),
        Err(ConfigError::MissingConfigPath) => {
            tracing::info!("No config path given, using defaults");
            Ok(ParleyConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> ParleyResult<()> {
    init_tracing(&TelemetryConfig::from_env());
    let config = load_config()?;

    let model = match &config.provider {
        Some(provider) => Some(ProviderRegistry::from_config(provider)?.model()?),
        None => None,
    };
    let policy: Arc<dyn ProposalPolicy> = match &model {
        Some(model) => Arc::new(ModelJudgedProposals::new(Arc::clone(model))),
        None => Arc::new(AcceptAllProposals),
    };

    let directory = Arc::new(AgentDirectory::new());

    let planner_space = vec![
        Communicate::new(Arc::clone(&directory), config.protocol.clone()).into_action(),
        Finish::action(),
    ]
    .into_iter()
    .collect();
    let mut planner = Agent::new(
        AgentProfile::new("planner", "plans trips and delegates bookings"),
        planner_space,
        GraphNarrower::new([Communicate::KEY]).with_edge(Communicate::KEY, [Finish::KEY]),
        RandomSelector::default(),
        Finish::KEY,
    );

    let concierge_space = vec![
        Action::new("answer", "Answer the request", Answer { model }),
        Finish::action(),
    ]
    .into_iter()
    .collect();
    let mut concierge = Agent::new(
        AgentProfile::new("concierge", "books hotels and restaurants"),
        concierge_space,
        GraphNarrower::new(["answer"]).with_edge("answer", [Finish::KEY]),
        RandomSelector::default(),
        Finish::KEY,
    );
    planner.befriend(&mut concierge);

    let ctx = planner
        .fresh_context()
        .with_conversation(Conversation::new().with(ChatMessage::user(request_from_args())));

    let planner = Arc::new(Mutex::new(planner));
    let concierge = Arc::new(Mutex::new(concierge));
    for (agent, retries) in [(&planner, config.protocol.proposal_retries), (&concierge, 0)] {
        let profile = agent.lock().await.profile().clone();
        let interface = standard_interface(
            profile.name.clone(),
            Arc::clone(agent),
            Arc::clone(&policy),
            retries,
        );
        directory.register(profile, interface);
    }

    let (result, _) = planner.lock().await.run(ctx).await?;
    let report = serde_json::json!({
        "termination": result.get("termination"),
        "turns": result.get("turns"),
        "answer": result.get("answer"),
        "transcript": result.get("transcript"),
    });
    println!("{report:#}");
    Ok(())
}
