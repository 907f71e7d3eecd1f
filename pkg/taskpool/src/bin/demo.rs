//! Exercises a taskpool by hand. Not part of the library's public surface.

use std::time::Duration;

use taskpool::Executor;

fn main() {
    env_logger::init();

    let executor = Executor::new();

    let futures: Vec<_> = (0..8)
        .map(|i| {
            executor
                .submit(move |is_cancelled| {
                    for _ in 0..5 {
                        if is_cancelled() {
                            return (None, 0);
                        }
                        std::thread::sleep(Duration::from_millis(20));
                    }
                    (Some(i * i), 0)
                })
                .unwrap()
        })
        .collect();

    for future in futures {
        let (out, error) = future.get().unwrap();
        println!("result: {:?} (error code {})", out, error);
    }

    executor.shutdown().unwrap();
}
