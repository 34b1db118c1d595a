use clap::Parser;

use garabatron::{
    HeapSettings, LogObserver, NodeKind, NodeRef, OperandStackInfo, VM, VMCreateInfo,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Live object count that triggers the first collection
    #[arg(long, default_value_t = 5)]
    threshold: usize,

    /// Maximum number of roots on the operand stack
    #[arg(long, default_value_t = 256)]
    stack_size: usize,

    /// How many times to run the demo script
    #[arg(long, default_value_t = 1)]
    rounds: usize,

    /// Keep each round's result on the stack instead of dropping it
    #[arg(long)]
    keep: bool,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let info = VMCreateInfo {
        heap: HeapSettings {
            initial_threshold: cli.threshold,
        },
        stack: OperandStackInfo {
            stack_size: cli.stack_size,
        },
    };
    if let Err(reason) = info.validate() {
        eprintln!("Invalid configuration: {}", reason);
        std::process::exit(1);
    }

    let mut vm = VM::new(info).with_observer(LogObserver);

    for round in 1..=cli.rounds {
        vm.push_scalar(1);
        vm.push_scalar(2);
        vm.make_pair();
        vm.push_scalar(3);
        vm.push_scalar(4);
        vm.make_pair();
        let result = vm.make_pair();

        println!("round {}: built {}", round, render(&vm, result));

        if !cli.keep {
            vm.pop();
        }
        vm.collect();

        let stats = vm.stats();
        println!(
            "round {}: {} live, threshold {}, {} collections, {} reclaimed so far",
            round,
            vm.live_objects(),
            vm.threshold(),
            stats.collections,
            stats.total_reclaimed,
        );
    }
}

fn render(vm: &VM, node: NodeRef) -> String {
    match vm.get(node).map(|node| node.kind) {
        Some(NodeKind::Scalar { value }) => value.to_string(),
        Some(NodeKind::Pair { left, right }) => {
            format!("({} {})", render(vm, left), render(vm, right))
        }
        None => "<reclaimed>".to_string(),
    }
}
