mod common;

use fedsa::SimulationBuilder;
use rand::{SeedableRng, rngs::StdRng, seq::index};

use common::scenario;

#[tokio::test]
async fn synchronous_rounds_follow_the_random_cohorts() {
    let mut simulation = SimulationBuilder::new()
        .without_output()
        .build(scenario("synchronous", "no_dp", 5))
        .unwrap();

    let log = simulation.run().await.unwrap();
    let reports = simulation.reports();
    assert_eq!(reports.len(), 5);
    assert_eq!(log.len(), 5);

    // First round by hand: the cohort is the first sample of the seeded generator and every
    // client still needs its full prepare time `id + 1`.
    let mut rng = StdRng::seed_from_u64(42);
    let first = index::sample(&mut rng, 10, 3).into_vec();
    assert_eq!(reports[0].cohort, first);
    assert_eq!(
        reports[0].cost,
        first.iter().map(|&c| (c + 1) as f64).fold(0., f64::max)
    );

    // The rest replaying the same decisions on a plain vector.
    let mut remaining: Vec<f64> = (1..=10).map(f64::from).collect();
    let mut rng = StdRng::seed_from_u64(42);
    let mut clock = 0.;

    for report in reports {
        let cohort = index::sample(&mut rng, 10, 3).into_vec();
        let cost = cohort.iter().map(|&c| remaining[c]).fold(0., f64::max);
        clock += cost;

        assert_eq!(report.cohort, cohort);
        assert_eq!(report.cost, cost);
        assert_eq!(report.clock, clock);

        remaining.iter_mut().for_each(|r| *r -= cost);
        for &c in &cohort {
            remaining[c] = (c + 1) as f64;
        }
    }
}

#[tokio::test]
async fn semi_asynchronous_rounds_harvest_the_fastest() {
    let mut simulation = SimulationBuilder::new()
        .without_output()
        .build(scenario("semi_asynchronous", "no_dp", 3))
        .unwrap();

    simulation.run().await.unwrap();
    let reports = simulation.reports();

    assert_eq!(reports[0].cohort, vec![0, 1, 2]);
    assert_eq!(reports[0].cost, 3.);

    // remaining after the first round: [1, 2, 3, 1, 2, 3, 4, 5, 6, 7]
    assert_eq!(reports[1].cohort, vec![0, 3, 1]);
    assert_eq!(reports[1].cost, 2.);

    // remaining after the second round: [1, 2, 1, 4, 0, 1, 2, 3, 4, 5]
    assert_eq!(reports[2].cohort, vec![4, 0, 2]);
    assert_eq!(reports[2].cost, 1.);
    assert_eq!(simulation.clock(), 6.);
}

#[tokio::test]
async fn virtual_clock_never_goes_back() {
    for scheduling in ["synchronous", "semi_asynchronous"] {
        let mut simulation = SimulationBuilder::new()
            .without_output()
            .build(scenario(scheduling, "laplace", 8))
            .unwrap();

        let log = simulation.run().await.unwrap();

        for pair in log.points().windows(2) {
            assert!(pair[1].clock >= pair[0].clock, "{scheduling}: {pair:?}");
        }
        for report in simulation.reports() {
            assert_eq!(report.cohort.len(), 3);
            assert!(report.cost >= 0.);
        }
    }
}
