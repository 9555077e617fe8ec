use std::error::Error;

use ffnet::{Activation, NeuralNetwork, Topology, Trainer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn train(
    nn: &mut NeuralNetwork,
    samples: &[(&[f64], &[f64])],
    eta: f64,
    n_epochs: usize,
) -> Result<(), Box<dyn Error>> {
    let n_logs = 10;
    let mut trainer = Trainer::new(nn, eta);
    for i_epoch in 0..n_epochs {
        let loss = trainer.train_one_epoch_slices(samples)?;
        if i_epoch % (n_epochs / n_epochs.min(n_logs)) == 0 || i_epoch == n_epochs - 1 {
            let percentage = (i_epoch as f64) / (n_epochs as f64) * 100.0;
            info!("[{percentage:.0}%] L = {:?}", loss.as_ref().iter().collect::<Vec<_>>());
        }
    }
    Ok(())
}

fn print_results(
    nn: &mut NeuralNetwork,
    samples: &[(&[f64], &[f64])],
) -> Result<(), Box<dyn Error>> {
    for i_layer in 0..nn.topology().n_layers() {
        if let Some(layer) = nn.params().pretty_print_layer(i_layer) {
            println!("=== Layer #{i_layer} ===\n{layer}\n");
        }
    }
    for (i, (x_i, y_i)) in samples.iter().enumerate() {
        let a_i = nn.predict(x_i)?;
        println!("[i = {i}] {x_i:?} => expected: {y_i:?}, result: {a_i:?}");
    }
    println!("L = {}", nn.loss(samples)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // A line through (0, 0.3) and (1, 0.6).
    let line: &[(&[f64], &[f64])] = &[(&[0.0], &[0.3]), (&[1.0], &[0.6])];
    let mut nn = NeuralNetwork::new(Topology::from_sizes(1, &[1], &[Activation::Unit])?);
    info!("training linear network");
    train(&mut nn, line, 0.1, 500)?;
    print_results(&mut nn, line)?;

    // An XOR gate.
    let xor: &[(&[f64], &[f64])] = &[
        (&[0.0, 0.0], &[0.0]),
        (&[0.0, 1.0], &[1.0]),
        (&[1.0, 0.0], &[1.0]),
        (&[1.0, 1.0], &[0.0]),
    ];
    let mut nn = NeuralNetwork::new(Topology::from_sizes(
        2,
        &[4, 1],
        &[Activation::Tanh, Activation::Sigmoid],
    )?);
    nn.randomize_weights(-1.0, 1.0)?;
    info!("training xor network");
    train(&mut nn, xor, 0.5, 20_000)?;
    print_results(&mut nn, xor)?;

    Ok(())
}
