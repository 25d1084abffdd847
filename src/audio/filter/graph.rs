//! A small directed filter graph: nodes are allocated by name, initialized
//! with typed arguments, linked pad to pad and finally configured, which
//! resolves the processing chain and propagates formats along it.

use std::collections::VecDeque;

use log::{debug, trace};

use super::nodes::{apply_gain, FilterArgs, FilterKind};
use crate::audio::frame::RawFrame;
use crate::error::{GraphBuildError, GraphRuntimeError};
use crate::models::AudioFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// Outcome of asking the sink for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    /// The output slot now holds a filtered frame.
    Ready,
    /// More input is needed before the graph can emit.
    WouldBlock,
    /// End of stream was signalled and every frame has been pulled.
    EndOfStream,
}

#[derive(Debug)]
struct Node {
    instance: String,
    kind: FilterKind,
    args: Option<FilterArgs>,
    input: Option<NodeId>,
    output: Option<NodeId>,
}

#[derive(Debug, Default)]
pub struct FilterGraph {
    nodes: Vec<Node>,
    chain: Vec<NodeId>,
    source_format: Option<AudioFormat>,
    output_format: Option<AudioFormat>,
    pending: VecDeque<RawFrame>,
    ready: VecDeque<RawFrame>,
    pool: Vec<RawFrame>,
    eof: bool,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_filter(&mut self, name: &str, instance: &str) -> Result<NodeId, GraphBuildError> {
        let kind = FilterKind::by_name(name).ok_or_else(|| GraphBuildError::FilterNotFound {
            name: name.to_string(),
        })?;
        if self.nodes.iter().any(|n| n.instance == instance) {
            return Err(GraphBuildError::InitFailed {
                instance: instance.to_string(),
                reason: "instance name already in use".to_string(),
            });
        }
        self.nodes.push(Node {
            instance: instance.to_string(),
            kind,
            args: None,
            input: None,
            output: None,
        });
        trace!("allocated filter {} as '{}'", name, instance);
        Ok(NodeId(self.nodes.len() - 1))
    }

    pub fn init_filter(&mut self, id: NodeId, args: FilterArgs) -> Result<(), GraphBuildError> {
        let node = self.node_mut(id).ok_or_else(|| GraphBuildError::InitFailed {
            instance: format!("#{}", id.0),
            reason: "no such node".to_string(),
        })?;
        let fail = |reason: String| GraphBuildError::InitFailed {
            instance: node.instance.clone(),
            reason,
        };
        if node.args.is_some() {
            return Err(fail("already initialized".to_string()));
        }
        if args.kind() != node.kind {
            return Err(fail(format!(
                "arguments for {} given to {}",
                args.kind().name(),
                node.kind.name()
            )));
        }
        args.validate().map_err(fail)?;
        node.args = Some(args);
        Ok(())
    }

    /// Connect the output pad of `from` to the input pad of `to`.
    pub fn link(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphBuildError> {
        let name = |graph: &Self, id: NodeId| {
            graph
                .nodes
                .get(id.0)
                .map(|n| n.instance.clone())
                .unwrap_or_else(|| format!("#{}", id.0))
        };
        let fail = |graph: &Self, reason: &str| GraphBuildError::LinkFailed {
            from: name(graph, from),
            to: name(graph, to),
            reason: reason.to_string(),
        };

        if from.0 >= self.nodes.len() || to.0 >= self.nodes.len() {
            return Err(fail(self, "unknown node"));
        }
        if from == to {
            return Err(fail(self, "cannot link a node to itself"));
        }
        let (src, dst) = (&self.nodes[from.0], &self.nodes[to.0]);
        if !src.kind.has_output() {
            return Err(fail(self, "source node has no output pad"));
        }
        if !dst.kind.has_input() {
            return Err(fail(self, "destination node has no input pad"));
        }
        if src.output.is_some() || dst.input.is_some() {
            return Err(fail(self, "pad already connected"));
        }

        self.nodes[from.0].output = Some(to);
        self.nodes[to.0].input = Some(from);
        Ok(())
    }

    /// Validate the graph and resolve the source → sink chain.
    pub fn configure(&mut self) -> Result<(), GraphBuildError> {
        if let Some(node) = self.nodes.iter().find(|n| n.args.is_none()) {
            return Err(GraphBuildError::ConfigureFailed(format!(
                "filter '{}' was never initialized",
                node.instance
            )));
        }

        let sources: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.nodes[i].kind == FilterKind::BufferSource)
            .collect();
        let source = match sources.as_slice() {
            [only] => NodeId(*only),
            [] => return Err(GraphBuildError::ConfigureFailed("graph has no source".to_string())),
            _ => {
                return Err(GraphBuildError::ConfigureFailed(
                    "graph has more than one source".to_string(),
                ))
            }
        };

        let mut format = match &self.nodes[source.0].args {
            Some(FilterArgs::BufferSource(args)) => {
                AudioFormat::new(args.sample_format, args.sample_rate, args.channel_layout)
            }
            _ => {
                return Err(GraphBuildError::ConfigureFailed(
                    "source has no buffer arguments".to_string(),
                ))
            }
        };
        let source_format = format;

        let mut chain = vec![source];
        let mut current = source;
        while let Some(next) = self.nodes[current.0].output {
            if chain.contains(&next) {
                return Err(GraphBuildError::ConfigureFailed("graph contains a cycle".to_string()));
            }
            // Every kind in this graph preserves the format it receives.
            format = match &self.nodes[next.0].args {
                Some(FilterArgs::Gain(_)) | Some(FilterArgs::BufferSink) => format,
                _ => {
                    return Err(GraphBuildError::ConfigureFailed(format!(
                        "'{}' cannot accept input",
                        self.nodes[next.0].instance
                    )))
                }
            };
            chain.push(next);
            current = next;
        }

        let last = &self.nodes[current.0];
        if last.kind != FilterKind::BufferSink {
            return Err(GraphBuildError::ConfigureFailed(format!(
                "output of '{}' is not connected",
                last.instance
            )));
        }
        if chain.len() != self.nodes.len() {
            return Err(GraphBuildError::ConfigureFailed(
                "graph has nodes not reachable from the source".to_string(),
            ));
        }

        debug!(
            "configured filter graph: {} ({})",
            chain
                .iter()
                .map(|id| self.nodes[id.0].instance.as_str())
                .collect::<Vec<_>>()
                .join(" -> "),
            source_format
        );
        self.chain = chain;
        self.source_format = Some(source_format);
        self.output_format = Some(format);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.source_format.is_some()
    }

    pub fn output_format(&self) -> Option<AudioFormat> {
        self.output_format
    }

    /// Feed one frame into the source. The frame is copied into a pooled slot,
    /// so the caller may reuse its frame immediately.
    pub fn push(&mut self, frame: &RawFrame) -> Result<(), GraphRuntimeError> {
        let expected = self.source_format.ok_or(GraphRuntimeError::NotConfigured)?;
        if self.eof {
            return Err(GraphRuntimeError::EndOfStream);
        }
        if frame.format() != expected || frame.channels() != expected.channels() {
            return Err(GraphRuntimeError::FormatMismatch {
                expected,
                actual: frame.format(),
            });
        }
        let mut slot = self.pool.pop().unwrap_or_default();
        slot.copy_from(frame);
        self.pending.push_back(slot);
        Ok(())
    }

    /// Signal that no more frames will be pushed.
    pub fn send_eof(&mut self) {
        self.eof = true;
    }

    /// Try to take one filtered frame from the sink into `out`.
    pub fn pull(&mut self, out: &mut RawFrame) -> Result<Pull, GraphRuntimeError> {
        if !self.is_configured() {
            return Err(GraphRuntimeError::NotConfigured);
        }
        self.run_pending();

        match self.ready.pop_front() {
            Some(mut frame) => {
                std::mem::swap(out, &mut frame);
                frame.clear();
                self.pool.push(frame);
                Ok(Pull::Ready)
            }
            None if self.eof => Ok(Pull::EndOfStream),
            None => Ok(Pull::WouldBlock),
        }
    }

    fn run_pending(&mut self) {
        while let Some(mut frame) = self.pending.pop_front() {
            for id in &self.chain {
                if let Some(FilterArgs::Gain(args)) = &self.nodes[id.0].args {
                    apply_gain(&mut frame, args.volume);
                }
            }
            self.ready.push_back(frame);
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }
}
