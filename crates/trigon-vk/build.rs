fn main() {
    // Re-run when the GLSL sources change
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../../shaders/triangle.vert");
    println!("cargo:rerun-if-changed=../../shaders/triangle.frag");

    #[cfg(feature = "builtin-shaders")]
    builtin::compile();
}

#[cfg(feature = "builtin-shaders")]
mod builtin {
    use std::{env, fs, path::PathBuf};

    pub fn compile() {
        let out = PathBuf::from(env::var("OUT_DIR").unwrap());
        let src_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap()).join("../../shaders");

        let comp = shaderc::Compiler::new().unwrap();
        let mut opts = shaderc::CompileOptions::new().unwrap();

        // Instance asks for API 1.0, so target that.
        opts.set_target_env(
            shaderc::TargetEnv::Vulkan,
            shaderc::EnvVersion::Vulkan1_0 as u32,
        );
        opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

        for (name, kind) in [
            ("triangle.vert", shaderc::ShaderKind::Vertex),
            ("triangle.frag", shaderc::ShaderKind::Fragment),
        ] {
            let src = fs::read_to_string(src_dir.join(name))
                .unwrap_or_else(|e| panic!("read {name}: {e}"));
            let spv = comp
                .compile_into_spirv(&src, kind, name, "main", Some(&opts))
                .unwrap_or_else(|e| panic!("compile {name}: {e}"));
            fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8()).unwrap();
        }
    }
}
