mod common;

use std::fs;

use fedsa::{
    SimErr, SimulationBuilder,
    config::{ActivationConfig, AggregationConfig, FailurePolicy, ModelConfig},
};

use common::scenario;

#[tokio::test]
async fn same_seed_same_run() {
    let run = || async {
        let mut config = scenario("semi_asynchronous", "gaussian", 6);
        config.model = ModelConfig::Mlp {
            hidden: 6,
            activation: ActivationConfig::Relu,
        };

        let mut simulation = SimulationBuilder::new()
            .without_output()
            .build(config)
            .unwrap();
        let log = simulation.run().await.unwrap();
        (log, simulation.reports().to_vec())
    };

    let (log_a, reports_a) = run().await;
    let (log_b, reports_b) = run().await;

    assert_eq!(log_a, log_b);
    assert_eq!(reports_a, reports_b);
}

#[tokio::test]
async fn learns_separable_blobs_without_noise() {
    let mut simulation = SimulationBuilder::new()
        .without_output()
        .build(scenario("synchronous", "no_dp", 20))
        .unwrap();

    let log = simulation.run().await.unwrap();
    let last = log.last().unwrap();

    assert_eq!(log.len(), 20);
    assert!(last.accuracy > 60., "final accuracy {}", last.accuracy);
    assert!(log.points().iter().all(|p| (0. ..=100.).contains(&p.accuracy)));
}

#[tokio::test]
async fn stepping_round_by_round() {
    let mut simulation = SimulationBuilder::new()
        .without_output()
        .build(scenario("synchronous", "laplace", 2))
        .unwrap();

    let first = simulation.run_round().await.unwrap();
    assert_eq!(first.round, 0);
    assert_eq!(simulation.clock(), first.cost);
    assert!(first.mean_local_loss.is_finite());

    let second = simulation.run_round().await.unwrap();
    assert_eq!(second.round, 1);
    assert_eq!(second.clock, first.cost + second.cost);

    // Already terminated, nothing else runs.
    let log = simulation.run().await.unwrap();
    assert_eq!(log.len(), 2);

    let err = simulation.run_round().await.unwrap_err();
    assert!(matches!(err, SimErr::Terminated { round: 2 }));
    assert_eq!(simulation.clock(), second.clock);
}

#[tokio::test]
async fn staleness_discounted_aggregation_runs() {
    let mut config = scenario("semi_asynchronous", "no_dp", 5);
    config.aggregation = AggregationConfig::StalenessDiscounted { exponent: 0.5 };
    config.dispatch.on_failure = FailurePolicy::Drop;

    let mut simulation = SimulationBuilder::new()
        .without_output()
        .build(config)
        .unwrap();

    assert_eq!(simulation.run().await.unwrap().len(), 5);
}

#[tokio::test]
async fn writes_metric_files_on_termination() {
    let dir = std::env::temp_dir().join(format!("fedsa-run-{}", std::process::id()));
    let mut config = scenario("synchronous", "no_dp", 3);
    config.output.dir = dir.clone();

    let mut simulation = SimulationBuilder::new().build(config).unwrap();
    simulation.run().await.unwrap();

    let mut names: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();

    assert_eq!(
        names,
        vec![
            "sync_acc_fed_logistic_3_dp_no_dp_epsilon_50_0.3.json",
            "sync_acc_fed_logistic_3_dp_no_dp_epsilon_50_0.3.txt",
        ]
    );

    let text = fs::read_to_string(dir.join(&names[1])).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.lines().all(|l| l.starts_with('(') && l.ends_with(')')));

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn configuration_errors_are_fatal() {
    let builder = SimulationBuilder::new().without_output();

    let mut config = scenario("synchronous", "gaussian", 5);
    config.privacy.epsilon = 0.;
    assert!(matches!(builder.build(config), Err(SimErr::InvalidConfig(_))));

    let mut config = scenario("synchronous", "no_dp", 5);
    config.participation = 0.;
    assert!(matches!(builder.build(config), Err(SimErr::InvalidConfig(_))));

    assert!(matches!(
        fedsa::SimConfig::from_json("{ \"clients\": 3 }"),
        Err(SimErr::Json(_))
    ));
}
