use anyhow::Result;

use webrunner_tool_registry::ToolRegistry;

/// Print the registered tool schemas.
pub fn list() -> Result<()> {
    let registry = ToolRegistry::with_builtin_tools();
    for schema in registry.schemas() {
        println!("{}", schema.name);
        println!("  {}", schema.description);
        for param in &schema.params {
            println!(
                "  - {} ({}{})",
                param.name,
                param.param_type,
                if param.required { ", required" } else { "" }
            );
        }
        println!();
    }
    Ok(())
}
