use fedsim_coordinator::{
    expand_experiment, Checkpointer, ClientTrainer, Coordinator, ExperimentSpec, RunState,
    SimClient,
};
use fedsim_core::seeded_rng;
use fedsim_data::load_dataset;
use pretty_assertions::assert_eq;
use test_log::test;

const EXPERIMENT: &str = r#"{
    "algo": "FedAvg",
    "data": "synth_small",
    "R": 2,
    "C": 0.5,
    "K": 4,
    "E": 1,
    "B": 16,
    "eta": 0.1,
    "seed": 13
}"#;

fn build_coordinator(checkpointer: Option<Checkpointer>) -> Coordinator {
    let spec: ExperimentSpec = serde_json::from_str(EXPERIMENT).unwrap();
    let config = expand_experiment(&spec).unwrap().remove(0);
    assert!(config.check());

    let (train, test) = load_dataset(&config.data, config.seed).unwrap();
    let shards = train.partition_iid(config.num_clients as usize, &mut seeded_rng(config.seed));
    let clients: Vec<Box<dyn ClientTrainer>> = shards
        .into_iter()
        .enumerate()
        .map(|(id, shard)| Box::new(SimClient::new(id, &config, shard)) as Box<dyn ClientTrainer>)
        .collect();

    Coordinator::new(config, clients, test, checkpointer).unwrap()
}

#[test]
fn full_run_populates_every_round() {
    let mut coordinator = build_coordinator(None);
    coordinator.run().unwrap();

    assert_eq!(coordinator.run_state(), RunState::Finished);
    assert_eq!(coordinator.elapsed_rounds(), 2);
    assert_eq!(coordinator.accuracies().len(), 2);
    for &accuracy in coordinator.accuracies() {
        assert!((0.0..=1.0).contains(&accuracy));
    }

    for round in 1..=2 {
        assert!(coordinator.global_model(round).is_some());
        for client in 0..4 {
            assert!(coordinator.client_model(round, client).is_some());
        }
    }
}

#[test]
fn runs_are_reproducible_from_the_seed() {
    let mut a = build_coordinator(None);
    let mut b = build_coordinator(None);
    a.run().unwrap();
    b.run().unwrap();

    assert_eq!(a.accuracies(), b.accuracies());
    assert_eq!(a.global_model(2).unwrap(), b.global_model(2).unwrap());
}

#[test]
fn round_state_is_written_to_disk() {
    let dir = std::env::temp_dir().join(format!("fedsim-round-loop-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let mut coordinator = build_coordinator(Some(Checkpointer::new(&dir)));
    coordinator.run().unwrap();

    let reloaded = Checkpointer::new(&dir).load_global_models(2).unwrap();
    // init model plus one averaged model per round
    assert_eq!(reloaded.len(), 3);
    assert_eq!(&reloaded[2], coordinator.global_model(2).unwrap());
    assert!(dir.join("server/client_models/client_models.bin").exists());

    std::fs::remove_dir_all(&dir).unwrap();
}
