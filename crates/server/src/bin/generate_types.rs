use std::{env, fs, path::Path};

use ts_rs::TS;

fn generate_types_content() -> String {
    const HEADER: &str = "// This file was generated by `cargo run --bin generate_types`.\n\
                          // Do not edit it by hand; change the Rust types instead.\n\n";

    let decls: Vec<String> = vec![
        db::models::surgery_case::CaseStatus::decl(),
        db::models::surgery_case::SurgeryCase::decl(),
        db::models::sales_opportunity::OpportunityStage::decl(),
        db::models::sales_opportunity::SalesOpportunity::decl(),
        db::models::surgical_kit::KitStatus::decl(),
        db::models::surgical_kit::SurgicalKit::decl(),
        db::models::inventory::InventoryItem::decl(),
        db::models::manufacturer::Manufacturer::decl(),
        db::models::dashboard::DashboardKpis::decl(),
        services::services::screen::ScreenPhase::decl(),
        services::services::screen::ScreenState::<()>::decl(),
        services::services::screens::ScreenKind::decl(),
        services::services::availability::AvailabilityRecord::decl(),
        services::services::availability::AvailabilityState::decl(),
        server::routes::health::HealthStatus::decl(),
        server::routes::screens::ScreenSummary::decl(),
        server::routes::availability::ResetAvailabilityRequest::decl(),
        utils::response::ApiResponse::<()>::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                d
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{HEADER}{body}\n")
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let check_mode = args.iter().any(|arg| arg == "--check");

    let shared_path = Path::new("shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("✅ shared/types.ts is up to date.");
            std::process::exit(0);
        } else {
            eprintln!("❌ shared/types.ts is not up to date. Please run 'cargo run --bin generate_types' and commit the changes.");
            std::process::exit(1);
        }
    }

    println!("Generating TypeScript types…");
    fs::create_dir_all(shared_path).expect("cannot create shared");
    fs::write(&types_path, generated).expect("unable to write types.ts");
    println!("✅ TypeScript types written to {}", types_path.display());
}
