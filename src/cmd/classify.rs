use issue_bridge::bridge::classify::ErrorClass;

pub fn cmd_classify(code: &str) {
    let class = ErrorClass::classify(code);
    println!("{} -> {} (project {})", code, class, class.project_id());
}
