//! 变量表命令

use anyhow::{Context, Result};
use baja_protocol::{Schema, Subsystem};
use clap::Args;

/// 打印变量表与所有权
#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// 只显示该角色拥有的变量
    #[arg(short, long)]
    pub role: Option<Subsystem>,
}

impl SchemaCommand {
    pub fn execute(&self) -> Result<()> {
        let schema = Schema::fleet().context("Fleet schema is inconsistent")?;
        for line in self.render(&schema) {
            println!("{}", line);
        }
        Ok(())
    }

    fn render(&self, schema: &Schema) -> Vec<String> {
        let ownership = schema.ownership();
        schema
            .registry()
            .descriptors()
            .filter(|d| match self.role {
                Some(role) => ownership.owner_of(d.id) == Some(role),
                None => true,
            })
            .map(|d| {
                let owner = ownership
                    .owner_of(d.id)
                    .map(|role| role.to_string())
                    .unwrap_or_else(|| "-".to_string());
                format!(
                    "0x{:03X}  {:<28} {:<6} default={:<8} owner={}",
                    d.id, d.name, d.unit, d.default, owner
                )
            })
            .collect()
    }
}
