use fedsa::SimConfig;

/// Ten clients with fixed prepare times `1..=10`, three of them per round.
pub fn scenario(scheduling: &str, mechanism: &str, rounds: usize) -> SimConfig {
    let json = format!(
        r#"{{
            "clients": 10,
            "participation": 0.3,
            "rounds": {rounds},
            "seed": 42,
            "scheduling": "{scheduling}",
            "latency": {{ "fixed": {{ "times": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10] }} }},
            "dataset": {{
                "synthetic": {{ "samples": 300, "features": 4, "classes": 3, "spread": 0.3, "test_fraction": 0.2 }},
                "partition": "iid"
            }},
            "model": "logistic",
            "training": {{ "local_epochs": 2, "batch_size": 8, "learning_rate": 0.5, "lr_decay": 0.99 }},
            "privacy": {{ "epsilon": 50.0, "delta": 1e-5, "clip": 5.0, "mechanism": "{mechanism}" }},
            "dispatch": {{ "workers": 3 }}
        }}"#
    );

    SimConfig::from_json(&json).unwrap()
}
