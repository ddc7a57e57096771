//! End-to-end deliberations assembled from the shared fixtures.

use parley_core::{Action, ActionKey, ActionResult, ActionSpace, ChatMessage, Conversation};
use parley_engine::{
    ActionSelector, Agent, DiscoverTools, EmbeddingSelector, Finish, GraphNarrower,
    ModelPromptedSelector, RandomSelector,
};
use parley_test_utils::assertions::{assert_collaborator_error, assert_configuration_error};
use parley_test_utils::fixtures::{chain_agent, echo_agent, failing_agent, profile, user_context};
use parley_test_utils::generators::{
    arb_action_key, arb_action_space, arb_distinct_keys, arb_embedding_vector, arb_task,
};
use parley_test_utils::{
    FixedEmbeddingProvider, MockToolCatalog, ScriptedModelClient, StaticAction,
};
use proptest::prelude::*;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn triage_space() -> (ActionSpace, Arc<std::sync::atomic::AtomicUsize>) {
    let flights = StaticAction::from_json(json!({"found": "flights"}));
    let flight_runs = flights.runs();
    let space = vec![
        Action::new("triage", "Read the request", StaticAction::default()),
        Action::new("hotels", "Find a hotel room for the night", StaticAction::from_json(json!({"found": "hotels"}))),
        Action::new("flights", "Book a flight to another city", flights),
        Finish::action(),
    ]
    .into_iter()
    .collect();
    (space, flight_runs)
}

fn triage_graph() -> GraphNarrower {
    GraphNarrower::new(["triage"])
        .with_edge("triage", ["hotels", "flights"])
        .with_edge("hotels", [Finish::KEY])
        .with_edge("flights", [Finish::KEY])
}

#[tokio::test]
async fn embedding_agent_follows_the_closest_branch() {
    let embedder = FixedEmbeddingProvider::new(vec![0.0, 0.0, 1.0])
        .with("I need to fly to Rome", vec![1.0, 0.1, 0.0])
        .with("Book a flight to another city", vec![1.0, 0.0, 0.0])
        .with("Find a hotel room for the night", vec![0.0, 1.0, 0.0]);
    let (space, flight_runs) = triage_space();
    let mut agent = Agent::new(
        profile("planner"),
        space,
        triage_graph(),
        EmbeddingSelector::new(Arc::new(embedder)),
        Finish::KEY,
    );

    let ctx = user_context(&agent, "I need to fly to Rome");
    let (result, _) = agent.run(ctx).await.unwrap();

    assert_eq!(result.get_str("found"), Some("flights"));
    assert_eq!(flight_runs.load(Ordering::SeqCst), 1);
    assert_eq!(
        agent.history().keys(),
        vec![ActionKey::new("triage"), ActionKey::new("flights"), ActionKey::new(Finish::KEY)]
    );
}

#[tokio::test]
async fn prompted_agent_passes_model_params_to_the_action() {
    let model = Arc::new(ScriptedModelClient::new([
        "```json\n{\"name\": \"hotels\", \"params\": {\"nights\": 2}}\n```",
    ]));
    let (space, _) = triage_space();
    let mut agent = Agent::new(
        profile("planner"),
        space,
        triage_graph(),
        ModelPromptedSelector::new(model.clone()),
        Finish::KEY,
    );

    let ctx = user_context(&agent, "somewhere to sleep please");
    let (result, _) = agent.run(ctx).await.unwrap();

    assert_eq!(result.get_str("found"), Some("hotels"));
    assert_eq!(model.call_count(), 1);
    assert!(model.prompts()[0].contains("somewhere to sleep please"));
    let hotels = agent.history().at(-2).unwrap();
    assert_eq!(hotels.action.name(), "hotels");
}

#[tokio::test]
async fn unresolvable_model_choice_stops_the_run() {
    let model = Arc::new(ScriptedModelClient::new(["I would rather not choose."]));
    let (space, _) = triage_space();
    let mut agent = Agent::new(
        profile("planner"),
        space,
        triage_graph(),
        ModelPromptedSelector::new(model),
        Finish::KEY,
    );
    let result = agent.run(agent.fresh_context()).await;
    assert_configuration_error(&result);
    assert_eq!(agent.history().len(), 1);
}

#[tokio::test]
async fn discovered_tools_are_invoked_with_selected_params() {
    let tools = Arc::new(MockToolCatalog::new(&["weather"]));
    let model = Arc::new(ScriptedModelClient::new([
        r#"{"name": "tool:weather", "params": {"city": "Oslo"}}"#,
    ]));
    let space: ActionSpace = vec![DiscoverTools::action(), Finish::action()].into_iter().collect();
    let narrower = GraphNarrower::new([DiscoverTools::KEY])
        .with_edge(DiscoverTools::KEY, [Finish::KEY])
        .with_registration_sink(Finish::KEY);
    let mut agent = Agent::new(
        profile("assistant"),
        space,
        narrower,
        ModelPromptedSelector::new(model),
        Finish::KEY,
    )
    .with_tools(tools.clone());

    let ctx = agent
        .fresh_context()
        .with_conversation(Conversation::new().with(ChatMessage::user("weather in Oslo?")));
    let (result, _) = agent.run(ctx).await.unwrap();

    assert_eq!(tools.calls(), vec!["weather".to_string()]);
    assert_eq!(
        result.get("output"),
        Some(&json!({"tool": "weather", "params": {"city": "Oslo"}}))
    );
}

#[tokio::test]
async fn finish_result_is_the_last_work_result() {
    let mut agent = chain_agent("worker", &["a".into(), "b".into()]);
    let (result, ctx) = agent.run(agent.fresh_context()).await.unwrap();
    assert_eq!(result, ActionResult::new());
    assert_eq!(ctx.previous_result, Some(result));
}

#[tokio::test]
async fn echo_agent_answers_with_the_user_message() {
    let mut agent = echo_agent("concierge");
    let ctx = user_context(&agent, "two nights in Lisbon");
    let (result, _) = agent.run(ctx).await.unwrap();
    assert_eq!(result.get_str("answer"), Some("two nights in Lisbon"));
    assert!(agent.is_finished());
}

#[tokio::test]
async fn failing_step_surfaces_as_collaborator_error() {
    let mut agent = failing_agent("worker", "no rooms left");
    let result = agent.run(agent.fresh_context()).await;
    assert_collaborator_error(&result);
    assert!(!agent.is_finished());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Random choices always come from the narrowed space.
    #[test]
    fn prop_random_choice_is_a_member(space in arb_action_space(8), seed in any::<u64>()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let ctx = parley_core::ActionContext::new(profile("p"));
        let selection = runtime.block_on(RandomSelector::seeded(seed).select(&space, &ctx)).unwrap();
        prop_assert!(space.contains(selection.action.key()));
    }

    /// The embedding selector returns the first candidate with the highest score.
    #[test]
    fn prop_embedding_choice_is_the_first_argmax(
        space in arb_action_space(5),
        vectors in prop::collection::vec(arb_embedding_vector(3), 5),
        query in arb_embedding_vector(3),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let mut embedder = FixedEmbeddingProvider::new(vec![0.0, 0.0, 0.0])
            .with("where to?", query.data.clone());
        let mut expected = None;
        let mut best = f32::NEG_INFINITY;
        for (action, vector) in space.iter().zip(&vectors) {
            embedder = embedder.with(action.description(), vector.data.clone());
            let score = query.cosine_similarity(vector).unwrap();
            if expected.is_none() || score > best {
                expected = Some(action.key().clone());
                best = score;
            }
        }
        let ctx = parley_core::ActionContext::new(profile("p"))
            .with_conversation(Conversation::new().with(ChatMessage::user("where to?")));
        let selector = EmbeddingSelector::new(Arc::new(embedder));
        let selection = runtime.block_on(selector.select(&space, &ctx)).unwrap();
        prop_assert_eq!(Some(selection.action.key().clone()), expected);
    }

    /// A late action joins the graph once; a second add is rejected.
    #[test]
    fn prop_added_action_is_unique(key in arb_action_key()) {
        prop_assume!(key.as_str() != Finish::KEY);
        let mut agent = echo_agent("concierge");
        let late = || Action::new(key.clone(), "late step", StaticAction::default());
        let producer = ActionKey::new("answer");
        if key == producer {
            assert_configuration_error(&agent.add_action(late(), Some(&producer)));
        } else {
            prop_assert!(agent.add_action(late(), Some(&producer)).is_ok());
            assert_configuration_error(&agent.add_action(late(), Some(&producer)));
        }
    }

    /// The task stack is last-in, first-out.
    #[test]
    fn prop_task_stack_is_lifo(tasks in prop::collection::vec(arb_task(), 1..6)) {
        let mut agent = echo_agent("concierge");
        for task in &tasks {
            agent.push_task(task.clone());
        }
        prop_assert_eq!(agent.current_task(), tasks.last());
        let popped: Vec<_> = std::iter::from_fn(|| agent.pop_task()).collect();
        let expected: Vec<_> = tasks.into_iter().rev().collect();
        prop_assert_eq!(popped, expected);
    }

    /// A chain of n steps always terminates after n + 1 executions.
    #[test]
    fn prop_chain_terminates(keys in arb_distinct_keys(8)) {
        prop_assume!(!keys.iter().any(|k| k.as_str() == Finish::KEY));
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let mut agent = chain_agent("worker", &keys);
        let ctx = agent.fresh_context();
        runtime.block_on(agent.run(ctx)).unwrap();

        let mut expected = keys.clone();
        expected.push(ActionKey::new(Finish::KEY));
        prop_assert_eq!(agent.history().keys(), expected);
    }

    /// Every step's context carries the previous step's result.
    #[test]
    fn prop_previous_result_is_threaded(keys in arb_distinct_keys(6), seed in any::<u64>()) {
        prop_assume!(!keys.iter().any(|k| k.as_str() == Finish::KEY));
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let space: ActionSpace = keys
            .iter()
            .enumerate()
            .map(|(i, k)| Action::new(k.clone(), "step", StaticAction::from_json(json!({"step": i}))))
            .chain(std::iter::once(Finish::action()))
            .collect();
        let mut narrower = GraphNarrower::new(keys.iter().cloned());
        for key in &keys {
            narrower.add_edge(key.clone(), [ActionKey::new(Finish::KEY)]);
        }
        let mut agent = Agent::new(profile("p"), space, narrower, RandomSelector::seeded(seed), Finish::KEY);
        let ctx = agent.fresh_context();
        runtime.block_on(agent.run(ctx)).unwrap();

        let entries: Vec<_> = agent.history().iter().collect();
        prop_assert_eq!(entries.len(), 2);
        prop_assert_eq!(entries[1].context.previous_result.as_ref(), Some(&entries[0].result));
    }
}
