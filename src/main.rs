fn cooperative_demo() {
    let items = std::sync::Arc::new(clotho::Semaphore::new(0));
    let slots = std::sync::Arc::new(clotho::Semaphore::new(3));

    let items_producer = std::sync::Arc::clone(&items);
    let slots_producer = std::sync::Arc::clone(&slots);
    let producer = clotho::spawn(move || {
        for i in 0..6 {
            slots_producer.down().unwrap();
            println!("producer: item {} ready", i);
            items_producer.up();
            clotho::yield_now();
        }
        println!("producer finished");
    });
    if let Err(e) = producer {
        eprintln!("failed to spawn producer: {}", e);
        return;
    }

    let items_consumer = std::sync::Arc::clone(&items);
    let slots_consumer = std::sync::Arc::clone(&slots);
    let consumer = clotho::spawn(move || {
        for i in 0..6 {
            items_consumer.down().unwrap();
            println!("consumer: item {} taken", i);
            slots_consumer.up();
        }
        println!("consumer finished");
    });
    if let Err(e) = consumer {
        eprintln!("failed to spawn consumer: {}", e);
        return;
    }

    // interleave with the producer/consumer pair
    for i in 0..3 {
        println!("main thread: round {}", i);
        clotho::yield_now();
    }
}

fn preemptive_demo() {
    for worker in 1..=2 {
        let spawned = clotho::spawn(move || {
            println!("worker {} starting", worker);
            let mut checksum = 0u64;
            for i in 0..40_000_000u64 {
                // no yields here; the tick is the only thing that lets the
                // other worker make progress
                checksum = checksum.wrapping_add(std::hint::black_box(i * worker));
            }
            println!("worker {} done: {}", worker, checksum);
        });
        if let Err(e) = spawned {
            eprintln!("failed to spawn worker {}: {}", worker, e);
        }
    }
}

fn main() {
    println!("--- Cooperative scheduling ---");
    let scheduler = clotho::Clotho::builder().stack_size(4 * 1024 * 1024).build();
    if let Err(e) = scheduler.run(cooperative_demo) {
        eprintln!("cooperative run failed: {}", e);
        if !e.is_recoverable() {
            return;
        }
    }

    println!("\n--- Preemptive scheduling ---");
    let scheduler = clotho::Clotho::builder()
        .preemption(true)
        .preemption_interval(10)
        .build();
    if let Err(e) = scheduler.run(preemptive_demo) {
        eprintln!("preemptive run failed: {}", e);
        if !e.is_recoverable() {
            return;
        }
    }

    println!("\nAll done!");
}
