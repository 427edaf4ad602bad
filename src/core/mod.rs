// ─── Install Core ───
// Turns a version name into a launch-ready installation plan.
//
// Architecture:
//   core/
//     version/     Descriptors, hierarchy resolution, OS rules, manifest
//     maven/       Artifact coordinates and repository URLs
//     downloader/  Concurrent downloads with SHA-1 validation
//     assets/      Asset index + object downloads
//     java/        Runtime probing and vendor runtimes
//     loaders/     Mojang and Forge/NeoForge flavors, installer processors
//     install/     Hooks, library selection, natives, pipeline, plan
//     auth/        Account handed over by the front end

pub mod assets;
pub mod auth;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod install;
pub mod java;
pub mod loaders;
pub mod maven;
pub mod platform;
pub mod version;

#[cfg(test)]
pub mod testing;
