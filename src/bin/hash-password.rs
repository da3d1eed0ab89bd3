use bcrypt::{hash, DEFAULT_COST};
use std::env;

fn main() {
    let password = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --bin hash-password <PASSWORD>");
        std::process::exit(1);
    });

    match hash(&password, DEFAULT_COST) {
        Ok(hashed) => {
            println!("\nPassword : {}", password);
            println!("Cost     : {}", DEFAULT_COST);
            println!("Hash     : {}\n", hashed);
            println!("# Seed the admin user with:");
            println!(
                "INSERT INTO users (name, email, password_hash) \
                 VALUES ('Admin', 'admin@example.com', '{}');",
                hashed
            );
        }
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    }
}
